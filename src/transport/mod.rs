//! Transport module - byte streams carrying protocol messages.
//!
//! Provides:
//! - Exact-length framed reads/writes over any async stream
//! - Dialing TCP addresses and Unix Domain Socket paths

mod dial;
mod framed;

pub use dial::{connect, Connection};
pub use framed::{FramedStream, DEFAULT_MAX_EMPTY_READS};
