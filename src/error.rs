use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or writing a statistics document
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("statistics file not found: {}", .path.display())]
    Missing { path: PathBuf },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize statistics: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StatsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StatsError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the backing file simply does not exist yet
    pub fn is_missing(&self) -> bool {
        matches!(self, StatsError::Missing { .. })
    }
}
