//! Protocol Module
//!
//! Text commands and the binary frame transfer spoken with the image server.
//!
//! ## Exchanges
//! Every exchange runs on a fresh TCP connection that is closed afterwards.
//!
//! ```text
//! update  ->  {"current_index": <int>, "total": <int>, ...}
//! info    ->  {"index": <int>, "total": <int>, "filename": "<string>", ...}
//! get_c   ->  ┌──────────────┬──────────────────────────────┐
//!             │ Len (4, BE)  │       Frame (Len bytes)      │
//!             └──────────────┴──────────────────────────────┘
//! ```
//!
//! Text replies carry no framing and no schema guarantees, so fields are
//! looked up by scanning for quoted markers rather than decoded.

mod command;
mod channel;
mod response;
mod frame;

pub use command::Command;
pub use channel::{run_command, CommandChannel};
pub use response::{
    fields, find_int_field, find_string_field, FieldKind, FieldValue, ResponseFields,
    ResponseText,
};
pub use frame::{
    fetch_frame, hex_preview, FrameDownloader, FrameHeader, ImageFrame, FRAME_HEADER_SIZE,
    RECV_CHUNK_SIZE,
};
