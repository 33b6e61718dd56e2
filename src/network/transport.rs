//! TCP Transport
//!
//! A single blocking connection to the image server.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::{Result, SyncError};
use super::Endpoint;

/// Socket timeouts for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Max wait for any bytes on a read
    pub recv: Duration,

    /// Max wait on a write; also bounds the TCP handshake
    pub send: Duration,
}

impl Timeouts {
    pub fn new(recv: Duration, send: Duration) -> Self {
        Self { recv, send }
    }

    pub fn from_millis(recv_ms: u64, send_ms: u64) -> Self {
        Self::new(Duration::from_millis(recv_ms), Duration::from_millis(send_ms))
    }
}

/// One TCP connection, owned by the operation that opened it
///
/// The socket is released by `close` or, failing that, on drop. `close` is
/// idempotent; I/O on a closed connection returns `NotConnected`.
pub struct Connection {
    /// `None` once closed
    stream: Option<TcpStream>,

    /// Remote endpoint for logging
    endpoint: Endpoint,

    timeouts: Timeouts,
}

impl Connection {
    /// Open a connection with the given timeouts
    ///
    /// Every resolved address is tried in order; the last handshake failure
    /// is reported as `SyncError::Connect`.
    pub fn open(endpoint: &Endpoint, timeouts: Timeouts) -> Result<Self> {
        let addrs = endpoint.resolve()?;

        let mut last_err: Option<io::Error> = None;
        for addr in addrs {
            let attempt = if timeouts.send.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, timeouts.send)
            };

            match attempt {
                Ok(stream) => {
                    Self::configure(&stream, timeouts)?;
                    tracing::debug!("Connected to {} ({})", endpoint, addr);
                    return Ok(Self {
                        stream: Some(stream),
                        endpoint: endpoint.clone(),
                        timeouts,
                    });
                }
                Err(e) => {
                    tracing::trace!("Connect attempt to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(SyncError::Connect {
            endpoint: endpoint.to_string(),
            reason: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no address attempted".to_string()),
        })
    }

    /// Apply timeouts and disable Nagle's algorithm
    fn configure(stream: &TcpStream, timeouts: Timeouts) -> Result<()> {
        stream.set_nodelay(true)?;

        if !timeouts.recv.is_zero() {
            stream.set_read_timeout(Some(timeouts.recv))?;
        }
        if !timeouts.send.is_zero() {
            stream.set_write_timeout(Some(timeouts.send))?;
        }

        Ok(())
    }

    /// Send all of `bytes`, returning the number written
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        let window = self.timeouts.send;
        let stream = self.stream_mut()?;

        stream
            .write_all(bytes)
            .map_err(|e| SyncError::from_io(e, window))?;

        Ok(bytes.len())
    }

    /// Read up to `buf.len()` bytes
    ///
    /// `Ok(0)` means the peer closed the connection in an orderly way.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let window = self.timeouts.recv;
        let stream = self.stream_mut()?;

        loop {
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SyncError::from_io(e, window)),
            }
        }
    }

    /// Close the connection. Calling this again is a no-op.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; dropping the stream releases the fd
            let _ = stream.shutdown(Shutdown::Both);
            tracing::trace!("Closed connection to {}", self.endpoint);
        }
    }

    /// Whether `close` has not yet run
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The remote endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            SyncError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            ))
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
