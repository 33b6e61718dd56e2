//! Tests for the Sync Loop
//!
//! These tests verify:
//! - A full update/info/get_c cycle renders exactly once
//! - A failed stage skips the rest of the cycle but still pauses once
//! - Loop state keeps previous values for absent fields
//! - Startup link wait is bounded; steady-state link loss is waited out

use std::thread;
use std::time::Duration;

use epd_sync::display::Display;
use epd_sync::error::{Result, SyncError};
use epd_sync::link::{status_cell, LinkMonitor, LinkNotifier, LinkStatus};
use epd_sync::sync_loop::{CycleOutcome, CycleStage, Pause, Sleeper, SyncLoop};
use epd_sync::Config;

#[path = "../common/mod.rs"]
mod common;

use common::{chunked, frame_bytes, pattern, MockServer, Reply};

// =============================================================================
// Test Collaborators
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum PanelEvent {
    Init,
    Render(usize),
    Sleep,
}

#[derive(Default)]
struct RecordingDisplay {
    events: Vec<PanelEvent>,
    frames: Vec<Vec<u8>>,
    fail_render: bool,
    fail_sleep: bool,
}

impl RecordingDisplay {
    fn render_count(&self) -> usize {
        self.frames.len()
    }
}

impl Display for RecordingDisplay {
    fn init(&mut self) -> Result<()> {
        self.events.push(PanelEvent::Init);
        Ok(())
    }

    fn render(&mut self, frame: &[u8]) -> Result<()> {
        if self.fail_render {
            return Err(SyncError::Display("panel busy".to_string()));
        }
        self.events.push(PanelEvent::Render(frame.len()));
        self.frames.push(frame.to_vec());
        Ok(())
    }

    fn sleep(&mut self) -> Result<()> {
        self.events.push(PanelEvent::Sleep);
        if self.fail_sleep {
            return Err(SyncError::Display("sleep command rejected".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSleeper {
    pauses: Vec<(Pause, Duration)>,
}

impl RecordingSleeper {
    fn count(&self, kind: Pause) -> usize {
        self.pauses.iter().filter(|(p, _)| *p == kind).count()
    }
}

impl Sleeper for RecordingSleeper {
    fn pause(&mut self, pause: Pause, duration: Duration) {
        self.pauses.push((pause, duration));
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

const UPDATE_REPLY: &[u8] = br#"{"current_index" : 3, "total" : 10}"#;
const INFO_REPLY: &[u8] = br#"{"index" : 3, "total" : 10, "filename" : "sunset.bin"}"#;

type TestLoop = SyncLoop<LinkMonitor, RecordingDisplay, RecordingSleeper>;

fn test_config(server: &MockServer) -> Config {
    Config::builder()
        .server_host("127.0.0.1")
        .server_port(server.port())
        .command_recv_timeout_ms(300)
        .send_timeout_ms(1000)
        .frame_recv_timeout_ms(1000)
        .cycle_interval(Duration::from_secs(180))
        .refresh_settle(Duration::from_secs(30))
        .link_poll_interval(Duration::from_millis(10))
        .link_wait_polls(3)
        .build()
}

fn connected_link() -> (LinkNotifier, LinkMonitor) {
    let (notifier, monitor) = status_cell();
    notifier.set(LinkStatus::Connected);
    (notifier, monitor)
}

fn setup_loop(config: Config, monitor: LinkMonitor) -> TestLoop {
    SyncLoop::with_sleeper(
        config,
        monitor,
        RecordingDisplay::default(),
        RecordingSleeper::default(),
    )
    .unwrap()
}

/// Server answering update/info with the canned replies and get_c with `body`
fn happy_server(body: Vec<u8>) -> MockServer {
    MockServer::start(move |cmd| match cmd {
        "update" => Reply::Text(UPDATE_REPLY.to_vec()),
        "info" => Reply::Text(INFO_REPLY.to_vec()),
        "get_c" => Reply::Chunks(chunked(&frame_bytes(&body), &[300, 1, 4096])),
        _ => Reply::Close,
    })
}

// =============================================================================
// Full Cycle Tests
// =============================================================================

#[test]
fn test_full_cycle_renders_once() {
    let body = pattern(1000);
    let server = happy_server(body.clone());
    let (_notifier, monitor) = connected_link();
    let mut sync = setup_loop(test_config(&server), monitor);

    let outcome = sync.run_cycle();

    assert!(matches!(outcome, CycleOutcome::Rendered { len: 1000 }));
    assert_eq!(server.received(), vec!["update", "info", "get_c"]);

    let display = sync.display();
    assert_eq!(display.render_count(), 1);
    assert_eq!(display.frames[0], body);
    assert_eq!(
        display.events,
        vec![PanelEvent::Init, PanelEvent::Render(1000), PanelEvent::Sleep]
    );

    let state = sync.state();
    assert_eq!(state.cycle, 1);
    assert_eq!(state.index, Some(3));
    assert_eq!(state.total, Some(10));
    assert_eq!(state.filename.as_deref(), Some("sunset.bin"));

    assert_eq!(
        sync.sleeper().pauses,
        vec![
            (Pause::RefreshSettle, Duration::from_secs(30)),
            (Pause::CycleInterval, Duration::from_secs(180)),
        ]
    );
}

#[test]
fn test_render_once_per_successful_fetch() {
    let server = happy_server(pattern(1000));
    let (_notifier, monitor) = connected_link();
    let mut sync = setup_loop(test_config(&server), monitor);

    for _ in 0..3 {
        assert!(sync.run_cycle().is_rendered());
    }

    assert_eq!(sync.display().render_count(), 3);
    assert_eq!(sync.sleeper().count(Pause::CycleInterval), 3);
    assert_eq!(sync.state().cycle, 3);
}

// =============================================================================
// Cycle Skip Tests
// =============================================================================

#[test]
fn test_update_timeout_skips_cycle() {
    let server = MockServer::start(|cmd| match cmd {
        "update" => Reply::Silent(Duration::from_secs(1)),
        "info" => Reply::Text(INFO_REPLY.to_vec()),
        _ => Reply::Chunks(vec![frame_bytes(&pattern(10))]),
    });
    let (_notifier, monitor) = connected_link();
    let mut sync = setup_loop(test_config(&server), monitor);

    let outcome = sync.run_cycle();

    match outcome {
        CycleOutcome::Skipped { stage, error } => {
            assert_eq!(stage, CycleStage::Update);
            assert!(error.is_timeout(), "got {:?}", error);
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert_eq!(server.received(), vec!["update"]);
    assert_eq!(sync.display().render_count(), 0);
    assert!(sync.display().events.is_empty());
    assert_eq!(sync.sleeper().pauses.len(), 1);
    assert_eq!(sync.sleeper().count(Pause::CycleInterval), 1);
}

#[test]
fn test_info_failure_skips_fetch() {
    let server = MockServer::start(|cmd| match cmd {
        "update" => Reply::Text(UPDATE_REPLY.to_vec()),
        "info" => Reply::Silent(Duration::from_secs(1)),
        _ => Reply::Chunks(vec![frame_bytes(&pattern(10))]),
    });
    let (_notifier, monitor) = connected_link();
    let mut sync = setup_loop(test_config(&server), monitor);

    let outcome = sync.run_cycle();

    assert!(matches!(
        outcome,
        CycleOutcome::Skipped { stage: CycleStage::Info, .. }
    ));
    assert_eq!(server.received(), vec!["update", "info"]);
    assert_eq!(sync.state().index, Some(3));
    assert_eq!(sync.sleeper().count(Pause::CycleInterval), 1);
}

#[test]
fn test_oversized_frame_skips_render() {
    let server = happy_server(pattern(2000));
    let (_notifier, monitor) = connected_link();
    let config = Config {
        image_capacity: 1999,
        ..test_config(&server)
    };
    let mut sync = setup_loop(config, monitor);

    let outcome = sync.run_cycle();

    match outcome {
        CycleOutcome::Skipped { stage, error } => {
            assert_eq!(stage, CycleStage::FetchAndRender);
            assert!(matches!(
                error,
                SyncError::FrameTooLarge { declared: 2000, capacity: 1999 }
            ));
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert_eq!(sync.display().render_count(), 0);
    assert_eq!(sync.sleeper().pauses.len(), 1);
}

#[test]
fn test_unreachable_server_skips_cycle() {
    let (_notifier, monitor) = connected_link();
    let config = Config::builder()
        .server_host("127.0.0.1")
        .server_port(common::closed_port().port())
        .build();
    let mut sync = setup_loop(config, monitor);

    let outcome = sync.run_cycle();

    assert!(matches!(
        outcome,
        CycleOutcome::Skipped { stage: CycleStage::Update, error: SyncError::Connect { .. } }
    ));
    assert_eq!(sync.sleeper().count(Pause::CycleInterval), 1);
}

#[test]
fn test_display_failure_skips_and_sleeps_panel() {
    let server = happy_server(pattern(100));
    let (_notifier, monitor) = connected_link();
    let display = RecordingDisplay {
        fail_render: true,
        ..RecordingDisplay::default()
    };
    let mut sync = SyncLoop::with_sleeper(
        test_config(&server),
        monitor,
        display,
        RecordingSleeper::default(),
    )
    .unwrap();

    let outcome = sync.run_cycle();

    assert!(matches!(
        outcome,
        CycleOutcome::Skipped { stage: CycleStage::FetchAndRender, error: SyncError::Display(_) }
    ));
    assert_eq!(sync.display().events, vec![PanelEvent::Init, PanelEvent::Sleep]);
    assert_eq!(sync.sleeper().count(Pause::RefreshSettle), 0);
    assert_eq!(sync.sleeper().count(Pause::CycleInterval), 1);
}

#[test]
fn test_render_error_reported_when_sleep_also_fails() {
    let server = happy_server(pattern(100));
    let (_notifier, monitor) = connected_link();
    let display = RecordingDisplay {
        fail_render: true,
        fail_sleep: true,
        ..RecordingDisplay::default()
    };
    let mut sync = SyncLoop::with_sleeper(
        test_config(&server),
        monitor,
        display,
        RecordingSleeper::default(),
    )
    .unwrap();

    match sync.run_cycle() {
        CycleOutcome::Skipped { error: SyncError::Display(msg), .. } => {
            assert_eq!(msg, "panel busy");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(sync.display().events, vec![PanelEvent::Init, PanelEvent::Sleep]);
    assert_eq!(sync.sleeper().count(Pause::CycleInterval), 1);
}

// =============================================================================
// Loop State Tests
// =============================================================================

#[test]
fn test_absent_fields_keep_previous_state() {
    let mut cycle = 0;
    let server = MockServer::start(move |cmd| match cmd {
        "update" => {
            cycle += 1;
            if cycle == 1 {
                Reply::Text(UPDATE_REPLY.to_vec())
            } else {
                Reply::Text(br#"{"current_index" : 4}"#.to_vec())
            }
        }
        "info" => Reply::Text(br#"{"status": "error", "data": {}}"#.to_vec()),
        _ => Reply::Chunks(vec![frame_bytes(&pattern(10))]),
    });
    let (_notifier, monitor) = connected_link();
    let mut sync = setup_loop(test_config(&server), monitor);

    sync.run_cycle();
    assert_eq!(sync.state().index, Some(3));
    assert_eq!(sync.state().total, Some(10));

    sync.run_cycle();
    assert_eq!(sync.state().index, Some(4));
    assert_eq!(sync.state().total, Some(10));
    assert_eq!(sync.state().filename, None);
}

#[test]
fn test_filename_bounded() {
    let server = MockServer::start(|cmd| match cmd {
        "info" => Reply::Text(br#"{"filename" : "0123456789abcdef.bmp"}"#.to_vec()),
        "update" => Reply::Text(UPDATE_REPLY.to_vec()),
        _ => Reply::Chunks(vec![frame_bytes(&pattern(10))]),
    });
    let (_notifier, monitor) = connected_link();
    let config = Config {
        filename_max_len: 8,
        ..test_config(&server)
    };
    let mut sync = setup_loop(config, monitor);

    sync.run_cycle();
    assert_eq!(sync.state().filename.as_deref(), Some("01234567"));
}

// =============================================================================
// Link Tests
// =============================================================================

#[test]
fn test_startup_link_wait_is_bounded() {
    let server = happy_server(pattern(10));
    let (_notifier, monitor) = status_cell();
    let sync = setup_loop(test_config(&server), monitor);

    let err = sync.wait_for_link(3).unwrap_err();

    assert!(matches!(err, SyncError::LinkUnavailable { polls: 3 }));
    assert!(server.received().is_empty());
}

#[test]
fn test_startup_link_wait_succeeds_when_link_comes_up() {
    let server = happy_server(pattern(10));
    let (notifier, monitor) = status_cell();
    let config = Config {
        link_wait_polls: 50,
        ..test_config(&server)
    };
    let sync = setup_loop(config, monitor);

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        notifier.set(LinkStatus::Connected);
        notifier
    });

    sync.wait_for_link(50).unwrap();
    let _notifier = writer.join().unwrap();
}

#[test]
fn test_run_fails_fast_without_link() {
    let server = happy_server(pattern(10));
    let (notifier, monitor) = status_cell();
    notifier.set(LinkStatus::Failed);
    let mut sync = setup_loop(test_config(&server), monitor);

    let err = sync.run().unwrap_err();
    assert!(matches!(err, SyncError::LinkUnavailable { polls: 3 }));
}

#[test]
fn test_link_loss_mid_run_is_waited_out() {
    let server = happy_server(pattern(64));
    let (notifier, monitor) = connected_link();
    let mut sync = setup_loop(test_config(&server), monitor);

    assert!(sync.run_cycle().is_rendered());

    notifier.set(LinkStatus::Disconnected);
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        notifier.set(LinkStatus::Connected);
        notifier
    });

    // Blocks past the startup bound (3 polls of 10ms) until the link returns
    assert!(sync.run_cycle().is_rendered());
    assert_eq!(sync.display().render_count(), 2);
    let _notifier = writer.join().unwrap();
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_invalid_config_rejected() {
    let (_notifier, monitor) = connected_link();
    let config = Config::builder().response_capacity(0).build();

    let result = SyncLoop::with_sleeper(
        config,
        monitor,
        RecordingDisplay::default(),
        RecordingSleeper::default(),
    );
    assert!(matches!(result, Err(SyncError::Config(_))));
}

#[test]
fn test_zero_intervals_rejected() {
    for config in [
        Config::builder().link_poll_interval(Duration::ZERO).build(),
        Config::builder().cycle_interval(Duration::ZERO).build(),
        Config::builder().send_timeout_ms(0).build(),
    ] {
        let (_notifier, monitor) = connected_link();
        let result = SyncLoop::with_sleeper(
            config,
            monitor,
            RecordingDisplay::default(),
            RecordingSleeper::default(),
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }
}
