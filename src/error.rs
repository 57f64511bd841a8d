//! Error types for the VM translator
//!
//! Translation has no recovery path: the first bad line aborts the run and
//! the message carries the offending source text so the user can find it.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, TranslateError>;

#[derive(Debug)]
pub enum TranslateError {
    Io(io::Error),
    /// First token of a line is not a known VM opcode
    UnknownOpcode { line: String },
    /// A command is missing a required operand
    MissingOperand { line: String },
    /// An index operand is not a non-negative integer in range
    InvalidIndex { line: String },
    /// A push/pop names a segment that does not exist
    UnknownSegment { line: String },
    /// `pop constant` has no target address
    ConstantPop { line: String },
    /// Wraps an error with the source file it occurred in
    Unit {
        path: PathBuf,
        source: Box<TranslateError>,
    },
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::UnknownOpcode { line } => write!(f, "unknown opcode in `{line}`"),
            Self::MissingOperand { line } => write!(f, "missing operand in `{line}`"),
            Self::InvalidIndex { line } => write!(f, "invalid index in `{line}`"),
            Self::UnknownSegment { line } => write!(f, "unknown segment in `{line}`"),
            Self::ConstantPop { line } => {
                write!(f, "cannot pop to the constant segment in `{line}`")
            }
            Self::Unit { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Unit { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for TranslateError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}
