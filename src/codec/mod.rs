//! Codec module - payload encoders and decoders for specific message types.
//!
//! - [`encode_heartbeat`] - heartbeat request carrying a Unix timestamp
//! - [`decode_servers`] - membership list returned by a heartbeat
//!
//! Every decoder first checks for a failure response and turns it into
//! [`WireError::Failure`](crate::WireError::Failure).
//!
//! # Example
//!
//! ```
//! use clusterwire::codec::{decode_servers, encode_servers};
//! use clusterwire::Message;
//!
//! let mut response = Message::new(64);
//! encode_servers(&mut response, &["10.0.0.1:9000", "10.0.0.2:9000"]);
//! let servers = decode_servers(&mut response).unwrap();
//! assert_eq!(servers, vec!["10.0.0.1:9000", "10.0.0.2:9000"]);
//! ```

mod heartbeat;
mod servers;

pub use heartbeat::encode_heartbeat;
pub use servers::{decode_failure, decode_servers, encode_failure, encode_servers};
