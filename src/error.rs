//src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the pipeline can report for a sample or a batch.
#[derive(Debug, Error)]
pub enum SpeciesIdError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed taxonomy '{}' (line {line}): {reason}", .path.display())]
    MalformedTaxonomy {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("taxonomy header has no '{field}' column")]
    MissingSpeciesColumn { field: String },

    #[error("cannot parse hit on line {line}: {reason}")]
    HitParse { line: usize, reason: String },

    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed (exit code: {code:?}): {stderr}")]
    SearchFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("abundance sum {sum:.10} after {stage} deviates from expected {expected:.10}")]
    AbundanceIntegrity {
        stage: &'static str,
        sum: f64,
        expected: f64,
    },

    #[error("invalid sample name '{name}'")]
    InvalidSampleName { name: String },

    #[error("sample name '{name}' is already taken by '{}'", .first.display())]
    DuplicateSample { name: String, first: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SpeciesIdError>;

impl SpeciesIdError {
    /// Wraps an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SpeciesIdError::Io {
            path: path.into(),
            source,
        }
    }
}
