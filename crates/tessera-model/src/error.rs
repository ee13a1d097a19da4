//! Errors raised while compiling a model description.

use std::error::Error;
use std::fmt;

/// Errors from [`Statedef::build`](crate::Statedef::build).
///
/// Every variant is a model-description defect reported before any
/// simulation state exists; nothing is partially constructed on failure.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    /// Two objects of the same kind share a name.
    DuplicateName {
        /// Object kind ("species", "reaction", ...).
        kind: &'static str,
        /// The offending name.
        name: String,
    },
    /// A declaration references an id that was never registered.
    UnknownId {
        /// Kind of the referenced object.
        kind: &'static str,
        /// The out-of-range index.
        index: u32,
    },
    /// A rate or diffusion constant is negative or non-finite.
    BadConstant {
        /// Which constant ("reaction kcst", "diffusion dcst", ...).
        kind: &'static str,
        /// Name of the owning definition.
        name: String,
        /// The rejected value.
        value: f64,
    },
    /// A reaction with no reactants and no products.
    EmptyReaction {
        /// Name of the reaction.
        name: String,
    },
    /// A stoichiometry entry with coefficient zero.
    ZeroStoichiometry {
        /// Name of the reaction.
        name: String,
    },
    /// Total reactant order exceeds [`MAX_ORDER`](crate::MAX_ORDER).
    OrderTooHigh {
        /// Name of the reaction.
        name: String,
        /// The computed order.
        order: u32,
    },
    /// A surface reaction with volume reactants on both sides of the patch.
    BothSidesVolume {
        /// Name of the surface reaction.
        name: String,
    },
    /// A patch hosts a surface reaction that touches the outer volume, but
    /// declares no outer compartment.
    OuterWithoutCompartment {
        /// Name of the patch.
        patch: String,
        /// Name of the surface reaction.
        sreac: String,
    },
    /// A voltage table's interval is malformed (`vmin >= vmax`, `dv <= 0`,
    /// or a non-finite bound).
    VoltageRange {
        /// Name of the transition.
        name: String,
    },
    /// A voltage table's length does not match its configured interval.
    VoltageTableSize {
        /// Name of the transition.
        name: String,
        /// `floor((vmax - vmin) / dv) + 1`.
        expected: usize,
        /// Length of the supplied table.
        found: usize,
    },
    /// A voltage table entry is negative or non-finite.
    BadTableEntry {
        /// Name of the transition.
        name: String,
        /// Index of the offending entry.
        index: usize,
    },
    /// A voltage transition whose source and destination state coincide.
    SelfTransition {
        /// Name of the transition.
        name: String,
    },
    /// A patch's initial potential lies outside an attached transition's
    /// configured voltage range.
    PotentialOutOfRange {
        /// Name of the patch.
        patch: String,
        /// Name of the transition whose range is violated.
        transition: String,
        /// The declared potential.
        potential: f64,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { kind, name } => {
                write!(f, "duplicate {kind} name '{name}'")
            }
            Self::UnknownId { kind, index } => {
                write!(f, "unknown {kind} id {index}")
            }
            Self::BadConstant { kind, name, value } => {
                write!(f, "{kind} of '{name}' must be finite and non-negative, got {value}")
            }
            Self::EmptyReaction { name } => {
                write!(f, "reaction '{name}' has no reactants and no products")
            }
            Self::ZeroStoichiometry { name } => {
                write!(f, "reaction '{name}' has a zero stoichiometric coefficient")
            }
            Self::OrderTooHigh { name, order } => {
                write!(f, "reaction '{name}' has order {order}, above the supported maximum")
            }
            Self::BothSidesVolume { name } => {
                write!(
                    f,
                    "surface reaction '{name}' has volume reactants on both the inner \
                     and outer side"
                )
            }
            Self::OuterWithoutCompartment { patch, sreac } => {
                write!(
                    f,
                    "patch '{patch}' hosts surface reaction '{sreac}' which touches the \
                     outer volume, but declares no outer compartment"
                )
            }
            Self::VoltageRange { name } => {
                write!(f, "voltage transition '{name}' has a malformed voltage interval")
            }
            Self::VoltageTableSize {
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "voltage transition '{name}' needs a table of {expected} entries, \
                     got {found}"
                )
            }
            Self::BadTableEntry { name, index } => {
                write!(
                    f,
                    "voltage transition '{name}' table entry {index} is negative or non-finite"
                )
            }
            Self::SelfTransition { name } => {
                write!(f, "voltage transition '{name}' maps a state onto itself")
            }
            Self::PotentialOutOfRange {
                patch,
                transition,
                potential,
            } => {
                write!(
                    f,
                    "patch '{patch}' initial potential {potential} V is outside the \
                     range of transition '{transition}'"
                )
            }
        }
    }
}

impl Error for ModelError {}
