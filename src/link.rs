//! Link Module
//!
//! Connectivity status of the network link.
//!
//! ## Ownership
//! The link collaborator is the only writer of the status cell (through a
//! [`LinkNotifier`]); the sync loop only reads it (through a [`LinkMonitor`]
//! or any [`Link`] implementation). Reads and writes are single atomic
//! operations, so no lock is shared between the notification context and the
//! loop.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};

use crate::error::Result;
use crate::network::Endpoint;

/// Step used by the default `await_connected` poll
const AWAIT_STEP: Duration = Duration::from_millis(50);

/// Link state as reported by the link collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkStatus {
    Disconnected = 0,
    Connected = 1,
    Failed = 2,
}

impl LinkStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkStatus::Connected,
            2 => LinkStatus::Failed,
            _ => LinkStatus::Disconnected,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, LinkStatus::Connected)
    }
}

/// Read side of a link collaborator
pub trait Link {
    /// Current status
    fn status(&self) -> LinkStatus;

    /// Block until the link is up or `timeout` elapses
    ///
    /// Returns `true` if the link is up.
    fn await_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.status().is_up() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(AWAIT_STEP.min(deadline - now));
        }
    }
}

/// Create a status cell, initially `Disconnected`
pub fn status_cell() -> (LinkNotifier, LinkMonitor) {
    let cell = Arc::new(AtomicU8::new(LinkStatus::Disconnected as u8));
    (
        LinkNotifier { cell: Arc::clone(&cell) },
        LinkMonitor { cell },
    )
}

/// Write side of the status cell; not cloneable, so there is one writer
#[derive(Debug)]
pub struct LinkNotifier {
    cell: Arc<AtomicU8>,
}

impl LinkNotifier {
    /// Publish a new status, returning the previous one
    pub fn set(&self, status: LinkStatus) -> LinkStatus {
        LinkStatus::from_u8(self.cell.swap(status as u8, Ordering::AcqRel))
    }

    /// Another reader of the same cell
    pub fn monitor(&self) -> LinkMonitor {
        LinkMonitor {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Read-only handle to the status cell
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    cell: Arc<AtomicU8>,
}

impl Link for LinkMonitor {
    fn status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.cell.load(Ordering::Acquire))
    }
}

// =============================================================================
// Host link watcher
// =============================================================================

/// Link collaborator for a host machine
///
/// A background thread checks on every tick whether the OS has a route to
/// the server and publishes the result. No packets are sent: a connected UDP
/// socket only consults the routing table. The thread stops when the watcher
/// is dropped.
pub struct HostLinkWatcher {
    monitor: LinkMonitor,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HostLinkWatcher {
    /// Start watching the route to `endpoint`
    pub fn spawn(endpoint: Endpoint, probe_interval: Duration) -> Result<Self> {
        let (notifier, monitor) = status_cell();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("link-watcher".to_string())
            .spawn(move || {
                let ticker = channel::tick(probe_interval);
                loop {
                    let status = probe_route(&endpoint);
                    let previous = notifier.set(status);
                    if previous != status {
                        tracing::info!("Link {:?} -> {:?} ({})", previous, status, endpoint);
                    }

                    crossbeam::select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(ticker) -> _ => {}
                    }
                }
                tracing::debug!("Link watcher stopped");
            })?;

        Ok(Self {
            monitor,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn monitor(&self) -> LinkMonitor {
        self.monitor.clone()
    }
}

impl Link for HostLinkWatcher {
    fn status(&self) -> LinkStatus {
        self.monitor.status()
    }
}

impl Drop for HostLinkWatcher {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the watcher's select
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `Failed` if the server name does not resolve, `Connected` if any resolved
/// address is routable
fn probe_route(endpoint: &Endpoint) -> LinkStatus {
    let addrs = match endpoint.resolve() {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::trace!("Link probe: {}", e);
            return LinkStatus::Failed;
        }
    };

    let routable = addrs.iter().any(|addr| {
        let local: SocketAddr = match addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        UdpSocket::bind(local)
            .and_then(|socket| socket.connect(addr))
            .is_ok()
    });

    if routable {
        LinkStatus::Connected
    } else {
        LinkStatus::Disconnected
    }
}
