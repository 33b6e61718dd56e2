//! Configuration for epd-sync
//!
//! Centralized configuration with defaults matching the 4.0" six-colour panel
//! and the reference image server.

use std::time::Duration;

use crate::display::PanelGeometry;
use crate::error::{Result, SyncError};
use crate::network::{Endpoint, Timeouts};

/// Main configuration for a sync loop instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Image server host name or IP address
    pub server_host: String,

    /// Image server TCP port
    pub server_port: u16,

    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Max bytes read for a text command reply
    pub response_capacity: usize,

    /// Max frame size accepted from `get_c` (in bytes)
    pub image_capacity: usize,

    /// Max stored length of a parsed filename (in bytes)
    pub filename_max_len: usize,

    // -------------------------------------------------------------------------
    // Timeout Configuration
    // -------------------------------------------------------------------------
    /// Text command receive timeout (milliseconds)
    pub command_recv_timeout_ms: u64,

    /// Send timeout for every command (milliseconds)
    pub send_timeout_ms: u64,

    /// Frame download receive timeout (milliseconds)
    pub frame_recv_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Loop Configuration
    // -------------------------------------------------------------------------
    /// Delay between the end of one cycle and the start of the next
    pub cycle_interval: Duration,

    /// Number of link polls at startup before giving up
    pub link_wait_polls: u32,

    /// Interval between link polls
    pub link_poll_interval: Duration,

    /// Time the panel is given to finish refreshing before it is put to sleep
    pub refresh_settle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "192.168.1.15".to_string(),
            server_port: 18888,
            response_capacity: 1024,
            image_capacity: PanelGeometry::EPD_4IN0E.frame_bytes(), // 120000
            filename_max_len: 255,
            command_recv_timeout_ms: 5000,
            send_timeout_ms: 5000,
            frame_recv_timeout_ms: 10_000,
            cycle_interval: Duration::from_secs(180),
            link_wait_polls: 30,
            link_poll_interval: Duration::from_secs(1),
            refresh_settle: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The image server endpoint
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server_host.clone(), self.server_port)
    }

    /// Timeouts used by `update` and `info`
    pub fn command_timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.command_recv_timeout_ms, self.send_timeout_ms)
    }

    /// Timeouts used by `get_c`
    pub fn frame_timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.frame_recv_timeout_ms, self.send_timeout_ms)
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server_host.trim().is_empty() {
            return Err(SyncError::Config("server host is empty".to_string()));
        }
        if self.server_port == 0 {
            return Err(SyncError::Config("server port must be non-zero".to_string()));
        }
        if self.response_capacity == 0 {
            return Err(SyncError::Config("response capacity must be non-zero".to_string()));
        }
        if self.image_capacity == 0 {
            return Err(SyncError::Config("image capacity must be non-zero".to_string()));
        }
        if self.image_capacity > u32::MAX as usize {
            return Err(SyncError::Config(format!(
                "image capacity {} exceeds the 32-bit frame header range",
                self.image_capacity
            )));
        }
        if self.command_recv_timeout_ms == 0 || self.frame_recv_timeout_ms == 0 {
            return Err(SyncError::Config("receive timeouts must be non-zero".to_string()));
        }
        if self.send_timeout_ms == 0 {
            return Err(SyncError::Config("send timeout must be non-zero".to_string()));
        }
        if self.link_poll_interval.is_zero() {
            return Err(SyncError::Config("link poll interval must be non-zero".to_string()));
        }
        if self.cycle_interval.is_zero() {
            return Err(SyncError::Config("cycle interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server host
    pub fn server_host(mut self, host: impl Into<String>) -> Self {
        self.config.server_host = host.into();
        self
    }

    /// Set the server port
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    /// Set the text reply capacity (in bytes)
    pub fn response_capacity(mut self, bytes: usize) -> Self {
        self.config.response_capacity = bytes;
        self
    }

    /// Set the frame capacity (in bytes)
    pub fn image_capacity(mut self, bytes: usize) -> Self {
        self.config.image_capacity = bytes;
        self
    }

    /// Size the frame capacity for a panel
    pub fn panel(mut self, geometry: PanelGeometry) -> Self {
        self.config.image_capacity = geometry.frame_bytes();
        self
    }

    /// Set the filename length bound (in bytes)
    pub fn filename_max_len(mut self, bytes: usize) -> Self {
        self.config.filename_max_len = bytes;
        self
    }

    /// Set the command receive timeout (in milliseconds)
    pub fn command_recv_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_recv_timeout_ms = ms;
        self
    }

    /// Set the send timeout (in milliseconds)
    pub fn send_timeout_ms(mut self, ms: u64) -> Self {
        self.config.send_timeout_ms = ms;
        self
    }

    /// Set the frame receive timeout (in milliseconds)
    pub fn frame_recv_timeout_ms(mut self, ms: u64) -> Self {
        self.config.frame_recv_timeout_ms = ms;
        self
    }

    /// Set the inter-cycle delay
    pub fn cycle_interval(mut self, interval: Duration) -> Self {
        self.config.cycle_interval = interval;
        self
    }

    /// Set the startup link poll bound
    pub fn link_wait_polls(mut self, polls: u32) -> Self {
        self.config.link_wait_polls = polls;
        self
    }

    /// Set the link poll interval
    pub fn link_poll_interval(mut self, interval: Duration) -> Self {
        self.config.link_poll_interval = interval;
        self
    }

    /// Set the panel refresh settle delay
    pub fn refresh_settle(mut self, delay: Duration) -> Self {
        self.config.refresh_settle = delay;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
