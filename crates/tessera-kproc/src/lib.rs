//! Kinetic processes for the Tessera stochastic reaction-diffusion engine.
//!
//! A kinetic process is one elementary stochastic transition bound to one
//! mesh element: a volume reaction in a voxel, a surface reaction on a
//! facet, a directed diffusive hop through one adjacency slot, or a
//! voltage-dependent state transition on a facet. [`KProc`] is a closed
//! enum over the five kinds; the scheduler talks to it through three
//! operations only: compute the current rate, apply one firing, and report
//! bookkeeping (activity, extent, constants).
//!
//! [`setup_deps`] builds the static dependency graph: for every process,
//! the set of processes whose rate can change when it fires. The graph is
//! computed once from read/write species sets and never updated, so it
//! must be a superset of the true dependencies at any population.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod deps;
pub mod diff;
pub mod kproc;
pub mod reac;
pub mod sdiff;
pub mod sreac;
pub mod vdeptrans;

pub use deps::setup_deps;
pub use diff::Diff;
pub use kproc::{Activity, KProc};
pub use reac::Reac;
pub use sdiff::SDiff;
pub use sreac::SReac;
pub use vdeptrans::VDepTrans;
