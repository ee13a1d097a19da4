//! Core types for the Tessera stochastic reaction-diffusion engine.
//!
//! This crate holds the vocabulary shared by every other Tessera crate:
//!
//! - strongly-typed indices for species, definitions, mesh elements, and
//!   kinetic processes ([`id`]);
//! - the species bitset used by dependency analysis ([`specset`]);
//! - the deterministic random source whose exact state is part of every
//!   checkpoint ([`rng`]);
//! - physical constants ([`consts`]).
//!
//! It has no internal dependencies and defines no simulation behavior.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod consts;
pub mod id;
pub mod rng;
pub mod specset;

pub use consts::AVOGADRO;
pub use id::{
    CompId, DiffId, FacetId, KProcId, LocalSpecId, PatchId, ReacId, SDiffId, SReacId, SpecId,
    VDepTransId, VoxelId,
};
pub use rng::{RngState, SimRng};
pub use specset::SpecSet;
