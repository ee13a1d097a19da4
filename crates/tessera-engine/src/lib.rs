//! The exact stochastic solver for the Tessera reaction-diffusion engine.
//!
//! [`Solver`] owns one realization: it instantiates every kinetic process
//! a compiled model implies on a mesh, schedules them with a
//! composition-rejection structure whose cost stays flat as rates spread
//! over many orders of magnitude, and advances the system one exact event
//! at a time. State access goes through per-element and aggregate
//! methods; [`Solver::checkpoint`] and [`Solver::restore`] serialize a
//! realization so a resumed run replays the original draw for draw.
//!
//! [`run_ensemble`] fans independent realizations out over worker
//! threads and collects per-seed probe results in a deterministic order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod ensemble;
pub mod error;
pub mod sched;
pub mod solver;

pub use ensemble::run_ensemble;
pub use error::SimError;
pub use sched::{BucketSummary, Scheduler, SchedulerDiagnostics};
pub use solver::Solver;
