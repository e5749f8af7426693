//! Error types for record store operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing a per-keyword record file.
///
/// None of these abort a crawl: load failures degrade to an empty mapping and
/// write failures leave the previous file in place.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// The record file exists but could not be read.
    #[error("failed to read record file {path}: {source}")]
    Read {
        /// Record file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record file is not a valid record document.
    #[error("record file {path} is corrupt: {source}")]
    Corrupt {
        /// Record file path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing the temp file or replacing the record file failed.
    #[error("failed to write record file {path}: {source}")]
    Write {
        /// Record file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The in-memory mapping could not be serialized.
    #[error("failed to encode records for {path}: {source}")]
    Encode {
        /// Record file path.
        path: PathBuf,
        /// Serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl RecordStoreError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn encode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }
}
