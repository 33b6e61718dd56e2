//! Network Module
//!
//! Blocking TCP transport to the image server.
//!
//! ## Connection Model
//! - One fresh connection per command exchange, no pooling
//! - Explicit receive/send timeouts on every socket
//! - Connection closed on every exit path (explicit `close` or drop)

mod endpoint;
mod transport;

pub use endpoint::Endpoint;
pub use transport::{Connection, Timeouts};
