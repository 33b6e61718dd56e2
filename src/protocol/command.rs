//! Command definitions
//!
//! The closed set of verbs understood by the image server.

use std::fmt;

use super::response::{fields, FieldKind};

/// A command sent to the server
///
/// Commands carry no payload; the wire form is the verb itself with no
/// terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Advance to the next image and report its position
    Update,

    /// Describe the current image
    Info,

    /// Download the current image as a length-prefixed frame
    GetC,
}

impl Command {
    /// Wire bytes for this command
    pub fn as_bytes(&self) -> &'static [u8] {
        self.verb().as_bytes()
    }

    /// Verb as sent on the wire
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Update => "update",
            Command::Info => "info",
            Command::GetC => "get_c",
        }
    }

    /// Fields expected in the text reply to this command
    ///
    /// `get_c` replies with a binary frame and has no text fields.
    pub fn reply_fields(&self, filename_max_len: usize) -> Vec<(&'static str, FieldKind)> {
        match self {
            Command::Update => vec![
                (fields::CURRENT_INDEX, FieldKind::Int),
                (fields::TOTAL, FieldKind::Int),
            ],
            Command::Info => vec![
                (fields::INDEX, FieldKind::Int),
                (fields::TOTAL, FieldKind::Int),
                (fields::FILENAME, FieldKind::Str { max_len: filename_max_len }),
            ],
            Command::GetC => Vec::new(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}
