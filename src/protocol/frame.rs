//! Frame download
//!
//! `get_c` transfer: a 4-byte big-endian length header followed by exactly
//! that many raw image bytes.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ Len (4, BE)  │       Frame (Len bytes)      │
//! └──────────────┴──────────────────────────────┘
//! ```

use std::fmt::Write as _;

use bytes::BytesMut;

use crate::error::{Result, SyncError};
use crate::network::{Connection, Endpoint, Timeouts};
use super::Command;

/// Size of the length header
pub const FRAME_HEADER_SIZE: usize = 4;

/// Max bytes requested per body read
pub const RECV_CHUNK_SIZE: usize = 4096;

/// Declared length of the upcoming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    declared_len: u32,
}

impl FrameHeader {
    pub fn new(declared_len: u32) -> Self {
        Self { declared_len }
    }

    pub fn decode(bytes: [u8; FRAME_HEADER_SIZE]) -> Self {
        Self::new(u32::from_be_bytes(bytes))
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        self.declared_len.to_be_bytes()
    }

    pub fn declared_len(&self) -> usize {
        self.declared_len as usize
    }

    /// Reject frames that would not fit in `capacity` bytes
    pub fn check_capacity(&self, capacity: usize) -> Result<usize> {
        let declared = self.declared_len();
        if declared > capacity {
            return Err(SyncError::FrameTooLarge { declared, capacity });
        }
        Ok(declared)
    }
}

/// Fixed-capacity image buffer for one cycle
///
/// Only the first `len()` bytes are valid after a successful download.
pub struct ImageFrame {
    buf: BytesMut,
    len: usize,
}

impl ImageFrame {
    /// Allocate a zeroed buffer of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::zeroed(capacity),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The received frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Downloads frames from a fixed endpoint
#[derive(Debug, Clone)]
pub struct FrameDownloader {
    endpoint: Endpoint,
    timeouts: Timeouts,
}

impl FrameDownloader {
    pub fn new(endpoint: Endpoint, timeouts: Timeouts) -> Self {
        Self { endpoint, timeouts }
    }

    /// Download into the front of `out`; see [`fetch_frame`]
    pub fn fetch(&self, out: &mut [u8]) -> Result<usize> {
        fetch_frame(&self.endpoint, out, self.timeouts)
    }

    /// Download into `frame`, recording the valid length
    pub fn fetch_into(&self, frame: &mut ImageFrame) -> Result<usize> {
        frame.len = 0;
        let len = self.fetch(&mut frame.buf[..])?;
        frame.len = len;
        Ok(len)
    }
}

/// Fetch one frame into `out`, whose length is the capacity bound
///
/// A declared length above `out.len()` fails with `FrameTooLarge` before any
/// frame byte is read. A close or read failure mid-body fails with
/// `TruncatedFrame`; there is no partial success. The connection is closed
/// on every path.
pub fn fetch_frame(endpoint: &Endpoint, out: &mut [u8], timeouts: Timeouts) -> Result<usize> {
    let mut conn = Connection::open(endpoint, timeouts)?;
    let result = transfer(&mut conn, out);
    conn.close();
    result
}

fn transfer(conn: &mut Connection, out: &mut [u8]) -> Result<usize> {
    tracing::debug!("Sending command: {}", Command::GetC);
    conn.send(Command::GetC.as_bytes())?;

    let header = read_header(conn)?;
    tracing::debug!("Image size: {} bytes", header.declared_len());

    let declared = header.check_capacity(out.len())?;

    let mut received = 0;
    while received < declared {
        let want = (declared - received).min(RECV_CHUNK_SIZE);
        match conn.recv(&mut out[received..received + want]) {
            Ok(0) => {
                tracing::warn!("Server closed connection at {}/{}", received, declared);
                return Err(SyncError::TruncatedFrame {
                    received,
                    expected: declared,
                });
            }
            Ok(n) => received += n,
            Err(e) => {
                tracing::warn!("Failed to receive image data at {}/{}: {}", received, declared, e);
                return Err(SyncError::TruncatedFrame {
                    received,
                    expected: declared,
                });
            }
        }
    }

    tracing::debug!("Received {} bytes image data", received);
    Ok(declared)
}

/// Read the length header, tolerating a split across reads
fn read_header(conn: &mut Connection) -> Result<FrameHeader> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut got = 0;

    while got < FRAME_HEADER_SIZE {
        let n = conn.recv(&mut header[got..])?;
        if n == 0 {
            return Err(SyncError::TruncatedFrame {
                received: got,
                expected: FRAME_HEADER_SIZE,
            });
        }
        got += n;
    }

    Ok(FrameHeader::decode(header))
}

/// Hex dump of the first `max` bytes, 16 per line with an ASCII column
pub fn hex_preview(data: &[u8], max: usize) -> String {
    let shown = &data[..data.len().min(max)];
    let mut out = String::new();

    for (line, chunk) in shown.chunks(16).enumerate() {
        let _ = write!(out, "{:08X}: ", line * 16);
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02X} ", b);
                }
                None => out.push_str("   "),
            }
        }
        out.push_str(" |");
        for &b in chunk {
            out.push(if (32..127).contains(&b) { b as char } else { '.' });
        }
        out.push_str("|\n");
    }

    if data.len() > shown.len() {
        let _ = write!(out, "... (truncated, total {} bytes)", data.len());
    }
    out
}
