//! Command channel
//!
//! One request/response exchange on a single-use connection.

use bytes::BytesMut;

use crate::error::Result;
use crate::network::{Connection, Endpoint, Timeouts};
use super::{Command, ResponseText};

/// Sends text commands to a fixed endpoint
#[derive(Debug, Clone)]
pub struct CommandChannel {
    endpoint: Endpoint,
    response_capacity: usize,
    timeouts: Timeouts,
}

impl CommandChannel {
    pub fn new(endpoint: Endpoint, response_capacity: usize, timeouts: Timeouts) -> Self {
        Self {
            endpoint,
            response_capacity,
            timeouts,
        }
    }

    /// Run one command and return the raw reply
    pub fn run(&self, command: Command) -> Result<ResponseText> {
        run_command(&self.endpoint, command, self.response_capacity, self.timeouts)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Open a connection, send `command`, read the reply, close
///
/// The read ends when `response_capacity` bytes have arrived, the server
/// closes the connection, or the receive timeout fires after some bytes have
/// arrived. A timeout before the first byte is an error. Nothing is retried.
pub fn run_command(
    endpoint: &Endpoint,
    command: Command,
    response_capacity: usize,
    timeouts: Timeouts,
) -> Result<ResponseText> {
    let mut conn = Connection::open(endpoint, timeouts)?;
    let result = exchange(&mut conn, command, response_capacity);
    conn.close();
    result
}

fn exchange(conn: &mut Connection, command: Command, capacity: usize) -> Result<ResponseText> {
    tracing::debug!("Sending command: {}", command);
    conn.send(command.as_bytes())?;

    let mut buf = BytesMut::zeroed(capacity);
    let mut received = 0;

    while received < capacity {
        match conn.recv(&mut buf[received..]) {
            Ok(0) => {
                tracing::trace!("Server closed connection after {} bytes", received);
                break;
            }
            Ok(n) => received += n,
            Err(e) if e.is_timeout() && received > 0 => {
                tracing::trace!("Reply idle after {} bytes, treating as complete", received);
                break;
            }
            Err(e) => return Err(e),
        }
    }

    buf.truncate(received);
    let reply = ResponseText::new(buf.freeze());
    tracing::debug!("Received {} response ({} bytes): {}", command, reply.len(), reply);
    Ok(reply)
}
