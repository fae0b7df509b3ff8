//! Servers-list and failure response payloads.
//!
//! Servers body:
//! ```text
//! ┌──────────┬──────────────────────────────┬─────┐
//! │ Count    │ Address 0 (NUL, word padded) │ ... │
//! │ uint64 LE│                              │     │
//! └──────────┴──────────────────────────────┴─────┘
//! ```
//!
//! Failure body: `uint64 LE` code followed by a padded message string.

use crate::error::{Result, WireError};
use crate::protocol::{response_type, Message, WORD_SIZE};

/// Fill `response` with a servers list.
pub fn encode_servers<A: AsRef<str>>(response: &mut Message, servers: &[A]) {
    response.reset();
    response.put_u64(servers.len() as u64);
    for server in servers {
        response.put_string(server.as_ref());
    }
    response.put_header(response_type::SERVERS, 0, 0);
}

/// Fill `response` with a failure.
pub fn encode_failure(response: &mut Message, code: u64, message: &str) {
    response.reset();
    response.put_u64(code);
    response.put_string(message);
    response.put_header(response_type::FAILURE, 0, 0);
}

/// Decode the addresses carried by a servers response, in server order.
pub fn decode_servers(response: &mut Message) -> Result<Vec<String>> {
    response.rewind();
    match response.header().mtype {
        response_type::SERVERS => {}
        response_type::FAILURE => {
            let (code, message) = decode_failure(response)?;
            return Err(WireError::Failure { code, message });
        }
        other => {
            return Err(WireError::Decode(format!(
                "unexpected response type {}, expected servers",
                other
            )))
        }
    }

    let count = response.get_u64()?;
    // Every address takes at least one word.
    if count > (response.remaining() / WORD_SIZE) as u64 {
        return Err(WireError::Decode(format!(
            "servers count {} does not fit in {} body bytes",
            count,
            response.remaining()
        )));
    }

    (0..count).map(|_| response.get_string()).collect()
}

/// Decode the code and message of a failure response.
pub fn decode_failure(response: &mut Message) -> Result<(u64, String)> {
    response.rewind();
    let code = response.get_u64()?;
    let message = response.get_string()?;
    Ok((code, message))
}
