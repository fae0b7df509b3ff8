//! Error types for clusterwire.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream stopped accepting bytes before a buffer was fully written.
    #[error("short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Too many consecutive reads returned no data. Tokio streams only
    /// return an empty read at end of stream, so this means the peer hung up.
    #[error("end of stream: no progress after {attempts} consecutive empty reads")]
    NoProgress { attempts: usize },

    /// Response body larger than the configured maximum.
    #[error("response body of {size} bytes exceeds maximum {max}")]
    BodyTooLarge { size: usize, max: usize },

    /// Malformed or unexpected response payload.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The server answered with a failure response.
    #[error("server failure {code}: {message}")]
    Failure { code: u64, message: String },

    /// Caller deadline expired before the operation could proceed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The server store rejected an update.
    #[error("Server store error: {0}")]
    Store(String),

    /// Invalid client configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Configuration could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Client closed, or the connection was released.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Another error annotated with the phase that produced it.
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<WireError>,
    },
}

impl WireError {
    /// Wrap this error with a phase description.
    pub fn context(self, context: &'static str) -> Self {
        WireError::Context {
            context,
            source: Box::new(self),
        }
    }

    /// Innermost error, with all phase annotations stripped.
    pub fn root(&self) -> &WireError {
        let mut err = self;
        while let WireError::Context { source, .. } = err {
            err = source;
        }
        err
    }
}

/// Attach phase context to a failed result.
pub(crate) trait ResultExt<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T, E: Into<WireError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }
}

/// Result type alias using WireError.
pub type Result<T> = std::result::Result<T, WireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chain_display() {
        let err = WireError::ShortWrite {
            written: 3,
            expected: 8,
        }
        .context("failed to send header")
        .context("failed to send request");

        assert_eq!(
            err.to_string(),
            "failed to send request: failed to send header: short write: wrote 3 of 8 bytes"
        );
    }

    #[test]
    fn test_root_strips_context() {
        let err = WireError::NoProgress { attempts: 100 }.context("failed to receive body");
        assert!(matches!(err.root(), WireError::NoProgress { attempts: 100 }));

        let bare = WireError::ConnectionClosed;
        assert!(matches!(bare.root(), WireError::ConnectionClosed));
    }

    #[test]
    fn test_result_ext_converts_io() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe gone",
        ));
        let err = result.context("failed to send body").unwrap_err();
        assert!(err.to_string().starts_with("failed to send body: I/O error"));
        assert!(matches!(err.root(), WireError::Io(_)));
    }
}
