//! # clusterwire
//!
//! Client for a half-duplex binary request/response protocol spoken with a
//! single cluster server over a persistent stream connection.
//!
//! ## Architecture
//!
//! - **Protocol**: 8-byte little-endian header plus a word-aligned body
//! - **Transport**: exact-length reads/writes with a bound on empty reads
//! - **Client**: one exchange at a time, serialized by a connection lock
//! - **Heartbeat**: background task refreshing a [`ServerStore`] with the
//!   server's view of cluster membership
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use clusterwire::{Client, InMemoryServerStore, ServerStore};
//!
//! #[tokio::main]
//! async fn main() -> clusterwire::Result<()> {
//!     let store = Arc::new(InMemoryServerStore::new());
//!     let client = Client::builder()
//!         .connect("127.0.0.1:9001", store.clone())
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     println!("{:?}", store.get().await?);
//!
//!     client.close().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod store;
pub mod transport;

mod client;
mod heartbeat;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{Result, WireError};
pub use protocol::Message;
pub use store::{InMemoryServerStore, ServerStore};
