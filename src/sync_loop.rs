//! Sync Loop
//!
//! Drives the poll/download/render cycle against the image server.
//!
//! ## Cycle
//! ```text
//!   AwaitLink ──► Update ──► Info ──► FetchAndRender
//!       ▲            │         │            │
//!       │            ▼         ▼            ▼
//!       └──────────────── inter-cycle delay ◄┘
//! ```
//!
//! A failure in any stage skips the rest of the cycle and goes straight to
//! the delay; the next cycle starts over. Only the startup link wait is
//! bounded, and only it can end the loop.

use std::convert::Infallible;
use std::fmt;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::display::Display;
use crate::error::{Result, SyncError};
use crate::link::Link;
use crate::protocol::{
    fields, hex_preview, Command, CommandChannel, FrameDownloader, ImageFrame, ResponseFields,
};

/// Bytes of each frame shown in the debug hex dump
const HEX_PREVIEW_BYTES: usize = 20;

/// Why the loop is pausing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Panel finishing its refresh before it is put to sleep
    RefreshSettle,

    /// End of a cycle
    CycleInterval,
}

/// Blocking delay, replaceable in tests
pub trait Sleeper {
    fn pause(&mut self, pause: Pause, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn pause(&mut self, _pause: Pause, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Stage of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    AwaitLink,
    Update,
    Info,
    FetchAndRender,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::AwaitLink => "await-link",
            CycleStage::Update => "update",
            CycleStage::Info => "info",
            CycleStage::FetchAndRender => "fetch-and-render",
        };
        f.write_str(name)
    }
}

/// Result of one cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// A frame of `len` bytes was rendered
    Rendered { len: usize },

    /// `stage` failed and the rest of the cycle was skipped
    Skipped { stage: CycleStage, error: SyncError },
}

impl CycleOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, CycleOutcome::Rendered { .. })
    }
}

/// Image position last advertised by the server
///
/// Progress reporting only. Fields the server omits keep their previous
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopState {
    /// Cycles started so far
    pub cycle: u64,

    pub index: Option<i64>,
    pub total: Option<i64>,
    pub filename: Option<String>,
}

/// The sync loop
///
/// Owns its collaborators and the loop state; one instance per panel.
pub struct SyncLoop<L, D, S = ThreadSleeper> {
    config: Config,
    link: L,
    display: D,
    sleeper: S,
    commands: CommandChannel,
    frames: FrameDownloader,
    state: LoopState,
}

impl<L: Link, D: Display> SyncLoop<L, D, ThreadSleeper> {
    /// Create a loop that sleeps the calling thread between cycles
    pub fn new(config: Config, link: L, display: D) -> Result<Self> {
        Self::with_sleeper(config, link, display, ThreadSleeper)
    }
}

impl<L: Link, D: Display, S: Sleeper> SyncLoop<L, D, S> {
    /// Create a loop with a custom sleeper
    pub fn with_sleeper(config: Config, link: L, display: D, sleeper: S) -> Result<Self> {
        config.validate()?;

        let endpoint = config.endpoint();
        let commands = CommandChannel::new(
            endpoint.clone(),
            config.response_capacity,
            config.command_timeouts(),
        );
        let frames = FrameDownloader::new(endpoint, config.frame_timeouts());

        Ok(Self {
            config,
            link,
            display,
            sleeper,
            commands,
            frames,
            state: LoopState::default(),
        })
    }

    /// Wait for the link, then cycle forever
    ///
    /// Returns only if the link does not come up within the startup bound.
    pub fn run(&mut self) -> Result<Infallible> {
        tracing::info!(
            "Syncing from {} every {:?}",
            self.commands.endpoint(),
            self.config.cycle_interval
        );

        self.wait_for_link(self.config.link_wait_polls)?;
        tracing::info!("Link up, entering main loop");

        loop {
            self.run_cycle();
        }
    }

    /// Bounded link wait: `polls` waits of `link_poll_interval` each
    pub fn wait_for_link(&self, polls: u32) -> Result<()> {
        if self.link.status().is_up() {
            return Ok(());
        }

        for remaining in (0..polls).rev() {
            if self.link.await_connected(self.config.link_poll_interval) {
                tracing::debug!("Link connected");
                return Ok(());
            }
            tracing::debug!("Waiting for link... ({} polls remaining)", remaining);
        }

        tracing::error!("Link did not come up after {} polls", polls);
        Err(SyncError::LinkUnavailable { polls })
    }

    /// Run one full cycle, including the trailing delay
    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.state.cycle += 1;
        tracing::info!("Loop #{}", self.state.cycle);

        self.await_link();

        let outcome = self.run_stages();
        match &outcome {
            CycleOutcome::Rendered { len } => {
                tracing::info!("Cycle #{} rendered {} bytes", self.state.cycle, len);
            }
            CycleOutcome::Skipped { stage, error } => {
                tracing::warn!("{} failed, retrying in next cycle: {}", stage, error);
            }
        }

        tracing::debug!("Waiting {:?} before next update", self.config.cycle_interval);
        self.sleeper
            .pause(Pause::CycleInterval, self.config.cycle_interval);

        outcome
    }

    /// Unbounded wait used once the loop is running
    fn await_link(&self) {
        if self.link.status().is_up() {
            return;
        }

        tracing::warn!("Link down, waiting for it to return");
        while !self.link.await_connected(self.config.link_poll_interval) {
            tracing::trace!("Link still down");
        }
        tracing::info!("Link restored");
    }

    fn run_stages(&mut self) -> CycleOutcome {
        if let Err(error) = self.update() {
            return CycleOutcome::Skipped {
                stage: CycleStage::Update,
                error,
            };
        }

        if let Err(error) = self.info() {
            return CycleOutcome::Skipped {
                stage: CycleStage::Info,
                error,
            };
        }

        match self.fetch_and_render() {
            Ok(len) => CycleOutcome::Rendered { len },
            Err(error) => CycleOutcome::Skipped {
                stage: CycleStage::FetchAndRender,
                error,
            },
        }
    }

    fn update(&mut self) -> Result<()> {
        let reply = self.commands.run(Command::Update)?;
        let found = ResponseFields::scan(
            reply.as_bytes(),
            &Command::Update.reply_fields(self.config.filename_max_len),
        );

        if let Some(index) = found.int(fields::CURRENT_INDEX) {
            self.state.index = Some(index);
        }
        if let Some(total) = found.int(fields::TOTAL) {
            self.state.total = Some(total);
        }

        tracing::debug!("Image index: {:?}, total: {:?}", self.state.index, self.state.total);
        Ok(())
    }

    fn info(&mut self) -> Result<()> {
        let reply = self.commands.run(Command::Info)?;
        let found = ResponseFields::scan(
            reply.as_bytes(),
            &Command::Info.reply_fields(self.config.filename_max_len),
        );

        if let Some(index) = found.int(fields::INDEX) {
            self.state.index = Some(index);
        }
        if let Some(total) = found.int(fields::TOTAL) {
            self.state.total = Some(total);
        }
        if let Some(filename) = found.string(fields::FILENAME) {
            self.state.filename = Some(filename.to_string());
        }

        tracing::info!(
            "Image info: index {:?} / {:?}, filename {}",
            self.state.index,
            self.state.total,
            self.state.filename.as_deref().unwrap_or("")
        );
        Ok(())
    }

    fn fetch_and_render(&mut self) -> Result<usize> {
        // Dropped on every return path, so no buffer outlives the cycle
        let mut frame = ImageFrame::with_capacity(self.config.image_capacity);

        let len = self.frames.fetch_into(&mut frame)?;
        tracing::info!("Image downloaded successfully: {} bytes", len);
        tracing::debug!("Frame head:\n{}", hex_preview(frame.as_bytes(), HEX_PREVIEW_BYTES));

        self.display.init()?;
        if let Err(e) = self.display.render(frame.as_bytes()) {
            if let Err(sleep_err) = self.display.sleep() {
                tracing::warn!("Display sleep after failed render: {}", sleep_err);
            }
            return Err(e);
        }
        tracing::info!("Image displayed successfully");

        self.sleeper
            .pause(Pause::RefreshSettle, self.config.refresh_settle);
        self.display.sleep()?;
        tracing::debug!("Display asleep");

        Ok(len)
    }

    /// Loop state after the most recent cycle
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }
}
