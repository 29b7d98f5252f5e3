// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Error types for mesh exchange and engine execution

use std::path::PathBuf;
use thiserror::Error;

use crate::io::Keyword;

/// Result type for mesh file operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type for engine and strategy operations.
pub type TetraResult<T> = Result<T, TetraError>;

/// Errors raised by the keyword mesh file codec.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The file could not be opened, read or written.
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither the binary magic number nor the ASCII version keyword was found.
    #[error("{path} is not a mesh file (missing magic/version marker)")]
    BadMagic { path: PathBuf },

    /// Version outside 1..=3.
    #[error("unsupported mesh format version {0}")]
    UnsupportedVersion(i32),

    /// Dimension other than 2 or 3.
    #[error("unsupported mesh dimension {0}")]
    UnsupportedDimension(i32),

    /// An ASCII keyword that is not followed by a record count.
    #[error("unknown keyword '{name}' at line {line}")]
    UnknownKeyword { name: String, line: usize },

    /// The file ended in the middle of a block.
    #[error("truncated {keyword} block at position {position}")]
    Truncated { keyword: Keyword, position: u64 },

    /// A value could not be parsed.
    #[error("invalid value '{text}' in {keyword} block at position {position}")]
    InvalidValue {
        keyword: Keyword,
        position: u64,
        text: String,
    },

    /// More records read or written than declared.
    #[error("{keyword} block holds {count} records, record {index} requested")]
    CountExceeded {
        keyword: Keyword,
        count: usize,
        index: usize,
    },

    /// A record whose shape does not match the keyword's fixed arity.
    #[error("{keyword} record expects {expected} values, got {got}")]
    ArityMismatch {
        keyword: Keyword,
        expected: usize,
        got: usize,
    },

    /// `read_record` without a matching `seek_block`.
    #[error("read of {keyword} without a preceding seek")]
    NotPositioned { keyword: Keyword },

    /// `write_record` for a keyword that was never declared, or whose block is full.
    #[error("write of {keyword} outside its declared block")]
    BlockNotDeclared { keyword: Keyword },

    /// A declared block was closed before all its records were written.
    #[error("{keyword} block declared {declared} records but {written} were written")]
    IncompleteBlock {
        keyword: Keyword,
        declared: usize,
        written: usize,
    },

    /// A 1-based index of zero, or a negative index, found on disk.
    #[error("invalid node index {value} in {keyword} block at position {position}")]
    BadIndex {
        keyword: Keyword,
        position: u64,
        value: i64,
    },

    /// Operation on a handle that has already been closed.
    #[error("mesh file handle is closed")]
    Closed,

    /// Structurally valid file whose content breaks an exchange invariant.
    #[error("invalid mesh content: {0}")]
    InvalidContent(String),
}

impl FormatError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while preparing, running or reading back a computation.
#[derive(Debug, Error)]
pub enum TetraError {
    /// Malformed, truncated or version-mismatched mesh file.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Native context, session or mesh object allocation failed.
    #[error("engine setup failed: {0}")]
    EngineSetup(String),

    /// The engine returned a non-OK compute status.
    #[error("engine computation failed:\n{log}")]
    EngineCompute { log: String },

    /// Cooperative cancellation was observed.
    #[error("interruption initiated by user")]
    Cancelled,

    /// The engine refused a named option.
    #[error("engine rejected parameter '{name}' = '{value}'")]
    ParameterRejected { name: String, value: String },

    /// The external executable exited abnormally.
    #[error("mesher executable failed ({status}):\n{log}")]
    Subprocess { status: String, log: String },

    /// Inconsistent or unresolvable hypothesis content.
    #[error("invalid hypothesis: {0}")]
    Hypothesis(String),

    /// Operation not allowed in the current session state.
    #[error("operation '{operation}' not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// The input mesh cannot be meshed as given.
    #[error("bad input mesh: {0}")]
    BadInput(String),

    /// Working file handling failed.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl TetraError {
    /// Diagnostic text attached to the error, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::EngineCompute { log } | Self::Subprocess { log, .. } => Some(log),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_cause_appears_once() {
        let cause = || std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");

        let format = TetraError::from(FormatError::io("/tmp/in.mesh", cause()));
        let chain = format!("{:#}", anyhow::Error::from(format));
        assert_eq!(chain, "I/O error on /tmp/in.mesh: no such file");

        let io = TetraError::from(cause());
        assert_eq!(io.to_string(), "I/O error");
        assert_eq!(io.source().map(|s| s.to_string()).as_deref(), Some("no such file"));
    }
}
