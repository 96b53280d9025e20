//! Error types for the tile loader

use thiserror::Error;

/// Main error type for the loader
///
/// `ManifestFetch`, `ManifestParse`, `Schema`, `UnsupportedCodec` and
/// `PlaceholderData` end a load. The per-node variants are caught by the
/// scheduler and never leave a batch.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to fetch manifest {path}: {source}")]
    ManifestFetch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON document: {0}")]
    ManifestParse(#[from] serde_json::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("failed to fetch node {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode node {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("node {0} is a large-file-storage placeholder")]
    Integrity(String),

    #[error("placeholder data detected: all {0} scheduled nodes are storage pointers")]
    PlaceholderData(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error aborts a whole load rather than a single node
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Fetch { .. } | Error::Decode { .. } | Error::Integrity(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_errors_are_not_fatal() {
        let fetch = Error::Fetch {
            key: "1-0-0-0".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!fetch.is_fatal());
        assert!(!Error::Integrity("0-0-0-0".into()).is_fatal());
        assert!(Error::Schema("no schema".into()).is_fatal());
        assert!(Error::UnsupportedCodec("zstandard".into()).is_fatal());
    }

    #[test]
    fn test_display_includes_key() {
        let err = Error::Decode {
            key: "2-1-1-0".into(),
            reason: "stride is zero".into(),
        };
        assert_eq!(err.to_string(), "failed to decode node 2-1-1-0: stride is zero");
    }
}
