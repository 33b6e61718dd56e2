//! Error types for epd-sync
//!
//! Provides a unified error type for all operations.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Unified error type for epd-sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Address error: {0}")]
    Address(String),

    #[error("Connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Frame too large: server declared {declared} bytes (capacity {capacity})")]
    FrameTooLarge { declared: usize, capacity: usize },

    #[error("Truncated frame: received {received} of {expected} bytes")]
    TruncatedFrame { received: usize, expected: usize },

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("Link unavailable after {polls} polls")]
    LinkUnavailable { polls: u32 },

    #[error("Display error: {0}")]
    Display(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Classify an I/O error raised by a blocking read or write.
    ///
    /// `WouldBlock` (Unix) and `TimedOut` (Windows) both mean the socket
    /// timeout fired.
    pub fn from_io(err: io::Error, window: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SyncError::Timeout(window),
            _ => SyncError::Io(err),
        }
    }

    /// True for the transport-level timeout variant
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout(_))
    }
}
