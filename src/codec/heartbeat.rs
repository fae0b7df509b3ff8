//! Heartbeat request encoding.

use crate::protocol::{request_type, Message};

/// Fill `request` with a heartbeat carrying `timestamp` (Unix seconds).
///
/// The message is reset first, so one instance can be reused every tick.
pub fn encode_heartbeat(request: &mut Message, timestamp: u64) {
    request.reset();
    request.put_u64(timestamp);
    request.put_header(request_type::HEARTBEAT, 0, 0);
}
