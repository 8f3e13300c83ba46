use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while building or reading an archive index.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("malformed manifest path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("malformed trade record '{line}': {reason}")]
    MalformedRecord { line: String, reason: String },

    #[error("symbol '{symbol}' doesn't decompose into a known currency pair")]
    UnresolvedSymbol { symbol: String },

    #[error("symbol '{symbol}' decomposes ambiguously ({candidates})")]
    AmbiguousSymbol { symbol: String, candidates: String },

    #[error("archive file '{}' doesn't exist", path.display())]
    MissingArchiveFile { path: PathBuf },

    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("invalid archive configuration: {0}")]
    InvalidConfig(String),
}

impl ArchiveError {
    pub(crate) fn malformed_path(path: &str, reason: impl Into<String>) -> Self {
        ArchiveError::MalformedPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_record(line: &str, reason: impl Into<String>) -> Self {
        ArchiveError::MalformedRecord {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(symbol: &str) -> Self {
        ArchiveError::UnresolvedSymbol {
            symbol: symbol.to_string(),
        }
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
