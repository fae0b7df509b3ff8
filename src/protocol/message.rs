//! Reusable protocol message: header plus word-aligned body.
//!
//! A [`Message`] owns a primary body buffer of fixed capacity and an overflow
//! buffer that is only allocated when an encoder writes past that capacity.
//! Call sites allocate one message and reuse it across calls:
//!
//! ```
//! use clusterwire::protocol::{request_type, Message};
//!
//! let mut request = Message::new(16);
//! request.put_u64(1_700_000_000);
//! request.put_header(request_type::HEARTBEAT, 0, 0);
//! assert_eq!(request.header().words, 1);
//!
//! request.reset();
//! assert_eq!(request.body_len(), 0);
//! ```

use bytes::Buf;

use super::wire_format::{words_for, Header, HEADER_SIZE, WORD_SIZE};
use crate::error::{Result, WireError};

/// Fixed-capacity byte storage with a count of valid bytes.
#[derive(Debug, Clone, Default)]
struct Buffer {
    bytes: Vec<u8>,
    offset: usize,
}

impl Buffer {
    fn room(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn valid(&self) -> &[u8] {
        &self.bytes[..self.offset]
    }
}

/// One protocol frame, outbound or inbound.
#[derive(Debug, Clone, Default)]
pub struct Message {
    header: Header,
    body1: Buffer,
    body2: Option<Vec<u8>>,
    /// Read position inside the primary buffer.
    cursor: usize,
}

impl Message {
    /// Create a message whose primary buffer holds at least `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        let mut message = Self::default();
        message.init(capacity);
        message
    }

    /// (Re)allocate the primary buffer and clear all state.
    ///
    /// Capacity is rounded up to a whole number of words.
    pub fn init(&mut self, capacity: usize) {
        let size = words_for(capacity) * WORD_SIZE;
        self.body1.bytes.clear();
        self.body1.bytes.resize(size, 0);
        self.reset();
    }

    /// Clear header, offsets and overflow, keeping the primary allocation.
    pub fn reset(&mut self) {
        self.header = Header::default();
        self.body1.offset = 0;
        self.body2 = None;
        self.cursor = 0;
    }

    /// Current header.
    #[inline]
    pub fn header(&self) -> Header {
        self.header
    }

    /// Primary buffer capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.body1.bytes.len()
    }

    /// Total valid body bytes across primary and overflow buffers.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body1.offset + self.body2.as_ref().map_or(0, Vec::len)
    }

    /// Whether the encoder spilled into the overflow buffer.
    #[inline]
    pub fn has_overflow(&self) -> bool {
        self.body2.is_some()
    }

    /// Valid bytes of the primary buffer.
    #[inline]
    pub fn body(&self) -> &[u8] {
        self.body1.valid()
    }

    /// Encoded header bytes.
    #[inline]
    pub fn header_bytes(&self) -> [u8; HEADER_SIZE] {
        self.header.encode()
    }

    /// Body segments in send order: primary, then overflow if present.
    pub fn body_segments(&self) -> (&[u8], Option<&[u8]>) {
        (self.body1.valid(), self.body2.as_deref())
    }

    // ------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------

    /// Append raw bytes, spilling into the overflow buffer once the primary
    /// buffer is full.
    pub fn put_bytes(&mut self, mut data: &[u8]) {
        if self.body2.is_none() {
            let n = self.body1.room().min(data.len());
            let start = self.body1.offset;
            self.body1.bytes[start..start + n].copy_from_slice(&data[..n]);
            self.body1.offset += n;
            data = &data[n..];
            if data.is_empty() {
                return;
            }
        }
        self.body2.get_or_insert_with(Vec::new).extend_from_slice(data);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.put_bytes(&[value]);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.put_bytes(&value.to_le_bytes());
    }

    /// Append a NUL-terminated string, zero-padded to a word boundary.
    pub fn put_string(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
        self.put_u8(0);
        self.pad_to_word();
    }

    /// Zero-pad the body to the next word boundary.
    pub fn pad_to_word(&mut self) {
        const ZEROS: [u8; WORD_SIZE] = [0; WORD_SIZE];
        let len = self.body_len();
        let pad = words_for(len) * WORD_SIZE - len;
        self.put_bytes(&ZEROS[..pad]);
    }

    /// Finish encoding: pad the body and write the header with the word count.
    pub fn put_header(&mut self, mtype: u8, flags: u8, extra: u16) {
        self.pad_to_word();
        let words = (self.body_len() / WORD_SIZE) as u32;
        self.header = Header::new(words, mtype, flags, extra);
    }

    // ------------------------------------------------------------------
    // Receiving
    // ------------------------------------------------------------------

    /// Install a received header and return the slice its body must be read
    /// into. Grows the primary buffer up to `max_body` bytes.
    pub(crate) fn prepare_recv(&mut self, header: Header, max_body: usize) -> Result<&mut [u8]> {
        let size = header.body_len();
        if size > max_body {
            return Err(WireError::BodyTooLarge {
                size,
                max: max_body,
            });
        }
        if size > self.body1.bytes.len() {
            self.body1.bytes.resize(size, 0);
        }

        self.header = header;
        self.body1.offset = size;
        self.body2 = None;
        self.cursor = 0;
        Ok(&mut self.body1.bytes[..size])
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    /// Unread bytes left in the primary buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.body1.offset - self.cursor
    }

    /// Move the read cursor back to the start of the body.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if n > self.remaining() {
            return Err(WireError::Decode(format!(
                "need {} bytes at offset {}, body has {}",
                n, self.cursor, self.body1.offset
            )));
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.body1.bytes[start..start + n])
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.get_u8())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(self.take(8)?.get_u64_le())
    }

    /// Read a NUL-terminated string and skip its word padding.
    pub fn get_string(&mut self) -> Result<String> {
        let unread = &self.body1.bytes[self.cursor..self.body1.offset];
        let len = unread
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| WireError::Decode("unterminated string".to_string()))?;
        let value = std::str::from_utf8(&unread[..len])
            .map_err(|e| WireError::Decode(format!("invalid UTF-8 in string: {}", e)))?
            .to_string();

        let end = words_for(self.cursor + len + 1) * WORD_SIZE;
        self.cursor = end.min(self.body1.offset);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::request_type;

    #[test]
    fn test_init_rounds_capacity_to_words() {
        assert_eq!(Message::new(16).capacity(), 16);
        assert_eq!(Message::new(13).capacity(), 16);
        assert_eq!(Message::new(0).capacity(), 0);
    }

    #[test]
    fn test_put_header_pads_and_counts_words() {
        let mut msg = Message::new(64);
        msg.put_u32(7);
        msg.put_u8(1);
        msg.put_header(request_type::CLIENT, 0, 3);

        assert_eq!(msg.body_len(), 8);
        assert_eq!(msg.header(), Header::new(1, request_type::CLIENT, 0, 3));
        assert_eq!(msg.body(), &[7, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_word_count_covers_body() {
        for len in 0..40 {
            let mut msg = Message::new(16);
            msg.put_bytes(&vec![0xAA; len]);
            msg.put_header(0, 0, 0);
            let words = msg.header().words as usize;
            assert!(words * WORD_SIZE >= len);
            assert_eq!(words * WORD_SIZE, msg.body_len());
        }
    }

    #[test]
    fn test_overflow_spills_into_secondary() {
        let mut msg = Message::new(8);
        msg.put_u64(1);
        assert!(!msg.has_overflow());

        msg.put_u64(2);
        msg.put_u32(3);
        msg.put_header(0, 0, 0);

        let (primary, overflow) = msg.body_segments();
        assert_eq!(primary, &1u64.to_le_bytes());
        let overflow = overflow.unwrap();
        assert_eq!(overflow.len(), 16);
        assert_eq!(&overflow[..8], &2u64.to_le_bytes());
        assert_eq!(msg.header().words, 3);
    }

    #[test]
    fn test_overflow_split_mid_value() {
        let mut msg = Message::new(8);
        msg.put_u32(0x11111111);
        msg.put_u64(0x2222222233333333);
        let (primary, overflow) = msg.body_segments();
        assert_eq!(primary.len(), 8);
        assert_eq!(overflow.unwrap().len(), 4);
    }

    #[test]
    fn test_reset_clears_overflow_and_header() {
        let mut msg = Message::new(8);
        msg.put_bytes(&[1; 20]);
        msg.put_header(9, 1, 1);

        msg.reset();
        assert_eq!(msg.body_len(), 0);
        assert!(!msg.has_overflow());
        assert_eq!(msg.header(), Header::default());
        assert_eq!(msg.capacity(), 8);
    }

    #[test]
    fn test_string_encode_decode() {
        let mut msg = Message::new(64);
        msg.put_string("10.0.0.1:9000");
        msg.put_string("");
        msg.put_u64(42);
        msg.put_header(0, 0, 0);

        // "10.0.0.1:9000" + NUL = 14 bytes -> 16, "" + NUL -> 8, u64 -> 8
        assert_eq!(msg.body_len(), 32);
        assert_eq!(msg.get_string().unwrap(), "10.0.0.1:9000");
        assert_eq!(msg.get_string().unwrap(), "");
        assert_eq!(msg.get_u64().unwrap(), 42);
        assert_eq!(msg.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_is_decode_error() {
        let mut msg = Message::new(8);
        msg.put_u32(1);
        msg.put_header(0, 0, 0);

        assert_eq!(msg.get_u64().unwrap(), 1);
        assert!(matches!(msg.get_u8(), Err(WireError::Decode(_))));
    }

    #[test]
    fn test_unterminated_string_rejected() {
        let mut msg = Message::new(8);
        msg.put_bytes(b"abcdefgh");
        assert!(matches!(msg.get_string(), Err(WireError::Decode(_))));
    }

    #[test]
    fn test_prepare_recv_grows_primary() {
        let mut msg = Message::new(16);
        let body = msg.prepare_recv(Header::new(4, 3, 0, 0), 1024).unwrap();
        assert_eq!(body.len(), 32);
        assert_eq!(msg.capacity(), 32);
        assert_eq!(msg.body_len(), 32);
        assert_eq!(msg.header().mtype, 3);
    }

    #[test]
    fn test_prepare_recv_rejects_oversized_body() {
        let mut msg = Message::new(16);
        let err = msg.prepare_recv(Header::new(1000, 3, 0, 0), 4096).unwrap_err();
        assert!(matches!(
            err,
            WireError::BodyTooLarge {
                size: 8000,
                max: 4096
            }
        ));
        assert_eq!(msg.capacity(), 16);
    }
}
