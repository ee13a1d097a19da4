//! Run-time error type of the solver surface.
//!
//! Only argument validation and capability checks produce these; once an
//! operation passes validation it either succeeds or panics on a broken
//! internal invariant. Model and mesh construction errors have their own
//! types in their own crates and cannot occur here, because a solver is
//! built from already-compiled inputs.

use std::fmt;

use tessera_checkpoint::CheckpointError;

/// Errors surfaced by solver methods.
#[derive(Debug)]
pub enum SimError {
    /// A typed index does not name an existing object.
    IndexOutOfRange {
        /// What kind of object the index was supposed to name.
        kind: &'static str,
        /// The offending index.
        index: u32,
        /// Number of objects of that kind.
        limit: u32,
    },
    /// The operation is valid in general but not for this configuration,
    /// such as addressing a species where it is not resident or a
    /// reaction not anchored in the addressed container.
    NotSupported {
        /// Human-readable description of the mismatch.
        what: String,
    },
    /// `run` was asked to stop in the past.
    EndTimeBeforeCurrent {
        /// The requested end time.
        end: f64,
        /// The current simulation time.
        now: f64,
    },
    /// `advance` was asked to move by a negative window.
    NegativeWindow {
        /// The requested window.
        dt: f64,
    },
    /// A physical quantity argument is negative or not finite.
    BadQuantity {
        /// What the quantity was supposed to be.
        what: &'static str,
        /// The offending value.
        value: f64,
    },
    /// A requested count does not fit a population counter.
    CountOverflow {
        /// The count that was requested.
        requested: f64,
    },
    /// A rate or diffusion constant argument is negative or not finite.
    BadRateConstant {
        /// The offending value.
        value: f64,
    },
    /// A requested potential lies outside a tabulated transition's range.
    PotentialOutOfRange {
        /// The requested potential in volts.
        potential: f64,
        /// Name of the transition whose table it misses.
        transition: String,
    },
    /// Checkpoint encode, decode, or validation failed.
    Checkpoint(CheckpointError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { kind, index, limit } => {
                write!(f, "{kind} index {index} out of range (have {limit})")
            }
            Self::NotSupported { what } => {
                write!(f, "not supported by this configuration: {what}")
            }
            Self::EndTimeBeforeCurrent { end, now } => {
                write!(f, "end time {end} s lies before the current time {now} s")
            }
            Self::NegativeWindow { dt } => {
                write!(f, "cannot advance by a negative window ({dt} s)")
            }
            Self::BadQuantity { what, value } => {
                write!(f, "{what} must be finite and non-negative, got {value}")
            }
            Self::CountOverflow { requested } => {
                write!(f, "requested count {requested} exceeds the population counter range")
            }
            Self::BadRateConstant { value } => {
                write!(f, "rate constant must be finite and non-negative, got {value}")
            }
            Self::PotentialOutOfRange {
                potential,
                transition,
            } => {
                write!(
                    f,
                    "potential {potential} V lies outside the tabulated range of transition '{transition}'"
                )
            }
            Self::Checkpoint(e) => write!(f, "checkpoint: {e}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Checkpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CheckpointError> for SimError {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}
