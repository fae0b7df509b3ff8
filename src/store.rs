//! Directory of known server addresses.
//!
//! The heartbeat loop publishes every membership list it receives into a
//! [`ServerStore`]. [`InMemoryServerStore`] keeps the latest snapshot in
//! process memory; persistent stores implement the same trait.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, WireError};

/// Holds the last known set of reachable server addresses.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Current snapshot, in server order.
    async fn get(&self) -> Result<Vec<String>>;

    /// Replace the snapshot.
    async fn set(&self, servers: Vec<String>) -> Result<()>;
}

/// Server store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryServerStore {
    servers: RwLock<Vec<String>>,
}

impl InMemoryServerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `servers`.
    pub fn with_servers<I, A>(servers: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            servers: RwLock::new(servers.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl ServerStore for InMemoryServerStore {
    async fn get(&self) -> Result<Vec<String>> {
        self.servers
            .read()
            .map(|servers| servers.clone())
            .map_err(|_| WireError::Store("server list lock poisoned".to_string()))
    }

    async fn set(&self, servers: Vec<String>) -> Result<()> {
        let mut guard = self
            .servers
            .write()
            .map_err(|_| WireError::Store("server list lock poisoned".to_string()))?;
        *guard = servers;
        Ok(())
    }
}
