//! # epd-sync
//!
//! Pulls a rotating image feed from a network server and renders it on an
//! e-paper panel:
//! - Single-use TCP connections with explicit timeouts
//! - Tolerant field lookup over schema-less text replies
//! - Length-prefixed frame download into a fixed-capacity buffer
//! - Cycle-level retry: any failure skips to the next cycle
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Sync Loop                             │
//! │       AwaitLink → Update → Info → FetchAndRender → delay     │
//! └───────┬──────────────────┬──────────────────┬───────────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!   ┌───────────┐    ┌───────────────┐   ┌─────────────┐
//!   │   Link    │    │   Protocol    │   │   Display   │
//!   │ (status)  │    │ channel/frame │   │  (driver)   │
//!   └───────────┘    └───────┬───────┘   └─────────────┘
//!                            │
//!                            ▼
//!                    ┌───────────────┐
//!                    │    Network    │
//!                    │ (TCP, 1 conn) │
//!                    └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod network;
pub mod protocol;
pub mod link;
pub mod display;
pub mod sync_loop;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SyncError, Result};
pub use config::Config;
pub use sync_loop::SyncLoop;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of epd-sync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
