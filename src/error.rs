//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MnbcError>;

#[derive(Debug, Error)]
pub enum MnbcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific file.
    #[error("cannot access {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A non-ACGT base was handed to a codec routine that needs a valid k-mer.
    #[error("invalid base '{}' at position {position}", *base as char)]
    InvalidBase { base: u8, position: usize },

    #[error("malformed genome index {}: {msg}", path.display())]
    MalformedIndex { path: PathBuf, msg: String },

    #[error("malformed taxonomy table at line {line}: {msg}")]
    MalformedTaxonomy { line: usize, msg: String },

    #[error("malformed read file {} at line {line}: {msg}", path.display())]
    ReadFormat {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    /// Mate headers disagree between the two paired-end streams.
    #[error("paired-end read ID mismatch: R1={r1_id}, R2={r2_id}")]
    PairedMismatch { r1_id: String, r2_id: String },

    #[error("paired-end files have different numbers of records")]
    PairedLengthMismatch,

    #[error("cannot create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("all {0} build tasks failed")]
    AllTasksFailed(usize),

    #[error("classification pipeline failed: {0}")]
    Pipeline(String),
}

impl MnbcError {
    /// Wrap an `io::Error` with the path it came from.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MnbcError::File {
            path: path.into(),
            source,
        }
    }
}
