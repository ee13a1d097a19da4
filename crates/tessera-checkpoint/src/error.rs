//! Error types for checkpoint encode and decode.

use std::fmt;
use std::io;

/// Errors that can occur while writing, reading, or applying a checkpoint.
#[derive(Debug)]
pub enum CheckpointError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The data does not start with the expected `b"TSRA"` magic bytes.
    BadMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the data.
        found: u8,
    },
    /// The checkpoint was taken from a structurally different model.
    ModelMismatch {
        /// Which structural quantity disagrees.
        what: String,
        /// The value recorded in the checkpoint.
        stored: u64,
        /// The value in the running solver.
        current: u64,
    },
    /// The data ended before the layout was complete.
    Truncated,
    /// A field decoded to a value the layout does not allow.
    Corrupt {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadMagic => write!(f, "invalid magic bytes (expected b\"TSRA\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported checkpoint format version {found}")
            }
            Self::ModelMismatch {
                what,
                stored,
                current,
            } => {
                write!(
                    f,
                    "model mismatch: checkpoint has {what} = {stored}, solver has {current}"
                )
            }
            Self::Truncated => write!(f, "checkpoint data ends before the layout is complete"),
            Self::Corrupt { detail } => write!(f, "corrupt checkpoint: {detail}"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        // A short read is a statement about the data, not about the sink.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}
