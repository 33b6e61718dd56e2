//! Server endpoint
//!
//! Immutable host/port pair identifying the image server.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Result, SyncError};

/// Image server address, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP literal
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to socket addresses
    ///
    /// Fails with `SyncError::Address` for an empty host, port 0, a name that
    /// does not resolve, or a resolution that yields no addresses.
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        if self.host.trim().is_empty() {
            return Err(SyncError::Address("empty host".to_string()));
        }
        if self.port == 0 {
            return Err(SyncError::Address(format!("{}: port 0 is not connectable", self)));
        }

        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| SyncError::Address(format!("{}: {}", self, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(SyncError::Address(format!("{}: no addresses", self)));
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}
