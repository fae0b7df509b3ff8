//! Wire format encoding and decoding.
//!
//! Implements the 8-byte header format:
//! ```text
//! ┌────────────┬───────┬───────┬──────────┐
//! │ Word count │ Type  │ Flags │ Extra    │
//! │ 4 bytes    │ 1 byte│ 1 byte│ 2 bytes  │
//! │ uint32 LE  │       │       │ uint16 LE│
//! └────────────┴───────┴───────┴──────────┘
//! ```
//!
//! The body follows the header and is always `word_count * WORD_SIZE` bytes.
//! All multi-byte integers are Little Endian.

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Size of one body word in bytes.
pub const WORD_SIZE: usize = 8;

/// Request message types.
pub mod request_type {
    /// Ask which server is the current leader.
    pub const LEADER: u8 = 0;
    /// Register this connection as a client.
    pub const CLIENT: u8 = 1;
    /// Liveness probe carrying the client timestamp.
    pub const HEARTBEAT: u8 = 2;
}

/// Response message types.
pub mod response_type {
    /// Error code plus message.
    pub const FAILURE: u8 = 0;
    /// Single server address.
    pub const SERVER: u8 = 1;
    /// Registration accepted.
    pub const WELCOME: u8 = 2;
    /// Current cluster membership.
    pub const SERVERS: u8 = 3;
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Body length in 8-byte words.
    pub words: u32,
    /// Payload kind discriminator.
    pub mtype: u8,
    /// Reserved for protocol extensions.
    pub flags: u8,
    /// Payload-specific auxiliary value.
    pub extra: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(words: u32, mtype: u8, flags: u8, extra: u16) -> Self {
        Self {
            words,
            mtype,
            flags,
            extra,
        }
    }

    /// Body length in bytes implied by the word count.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.words as usize * WORD_SIZE
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use clusterwire::protocol::Header;
    ///
    /// let bytes = Header::new(2, 5, 0, 0).encode();
    /// assert_eq!(bytes, [2, 0, 0, 0, 5, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.words.to_le_bytes());
        buf[4] = self.mtype;
        buf[5] = self.flags;
        buf[6..8].copy_from_slice(&self.extra.to_le_bytes());
        buf
    }

    /// Decode header from its fixed-size byte form.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            words: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            mtype: buf[4],
            flags: buf[5],
            extra: u16::from_le_bytes([buf[6], buf[7]]),
        }
    }
}

/// Number of words needed to hold `len` body bytes.
#[inline]
pub fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_SIZE)
}
