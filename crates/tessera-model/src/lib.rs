//! Definition registry for the Tessera stochastic reaction-diffusion engine.
//!
//! A model is assembled as plain data in a [`ModelSpec`] (species,
//! reactions, surface reactions, diffusion rules, voltage-dependent
//! transitions, compartments, and patches), then compiled by
//! [`Statedef::build`] into an immutable registry of definition objects
//! with dense indices and per-container local species maps.
//!
//! Compilation is the one-time finalization step: every name is resolved,
//! every cross-reference validated, and every stoichiometry table laid out.
//! After it succeeds there is no "not yet set up" state to guard against;
//! a [`Statedef`] is usable by construction. The only post-build mutation
//! is runtime rate-constant editing, which the solver routes through the
//! per-compartment and per-patch constant tables.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod compdef;
pub mod diffdef;
pub mod error;
pub mod patchdef;
pub mod reacdef;
pub mod spec;
pub mod sreacdef;
pub mod statedef;
pub mod vdeptransdef;

pub use compdef::Compdef;
pub use diffdef::{Diffdef, SurfDiffdef};
pub use error::ModelError;
pub use patchdef::Patchdef;
pub use reacdef::{Reacdef, MAX_ORDER};
pub use spec::{
    CompDecl, DiffDecl, ModelSpec, PatchDecl, ReacDecl, SDiffDecl, SReacDecl, VDepTransDecl,
};
pub use sreacdef::SReacdef;
pub use statedef::{Specdef, Statedef};
pub use vdeptransdef::VDepTransdef;
