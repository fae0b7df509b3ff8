//! Protocol module - wire format and message buffers.
//!
//! This module implements the binary framing shared by both directions:
//! - 8-byte header encoding/decoding
//! - Word-aligned message bodies with primary and overflow storage

mod message;
mod wire_format;

pub use message::Message;
pub use wire_format::{request_type, response_type, words_for, Header, HEADER_SIZE, WORD_SIZE};
