use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Faults raised by readers and writers.
///
/// These are usage and transport errors only: wrong call in the wrong
/// state, bad arguments, I/O failures.  Format-level problems never surface
/// here; they accumulate as [`crate::diagnostics::Diagnosis`] entries on the
/// record or reader and parsing continues.
#[derive(Error, Debug)]
pub enum ArcError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An operation was invoked in a state that does not permit it.
    /// The object's state is unchanged from before the call.
    #[error("Illegal call to {operation} in state {state}")]
    InvalidState {
        operation: &'static str,
        state:     &'static str,
    },

    #[error("Invalid argument for {context}: {reason}")]
    InvalidArgument {
        context: &'static str,
        reason:  String,
    },

    /// Streamed payload bytes did not match the header's declared
    /// Archive-length.  Suppressible on the writer via
    /// `set_exceptions_on_content_length_mismatch(false)`.
    #[error("Content-length mismatch: declared {declared}, streamed {streamed}")]
    ContentLengthMismatch { declared: i64, streamed: u64 },

    #[error("Unknown digest algorithm '{0}'")]
    UnknownDigestAlgorithm(String),

    /// Target file already exists and overwriting is disabled.
    #[error("Target file already exists: {0:?}")]
    TargetExists(PathBuf),

    #[error("Failed to rename {from:?} to {to:?}: {source}")]
    RenameFailed {
        from:   PathBuf,
        to:     PathBuf,
        source: io::Error,
    },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ArcError>;
