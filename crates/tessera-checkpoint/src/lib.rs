//! Binary checkpoint format for Tessera simulations.
//!
//! A checkpoint captures everything a solver needs to resume a run
//! bit-for-bit: populations, clamp flags, per-process counters and
//! constants, the scheduler's exact bucket structure, the random source
//! state, and the clock. The solver lowers its state into a [`Snapshot`],
//! which this crate encodes to any `Write` sink and decodes back from any
//! `Read` source.
//!
//! # Format
//!
//! ```text
//! [MAGIC "TSRA"] [VERSION u8] [Fingerprint]
//! [compartment rate tables] [patch rate tables]
//! [facet states] [voxel states]
//! [scheduler buckets + total] [rng state] [time, step count]
//! ```
//!
//! All integers are little-endian, all floats are IEEE-754 bit patterns,
//! and every field has a fixed position: no compression, no alignment
//! padding, no self-describing schema. Scheduler member order and bucket
//! sums are stored verbatim because in-bucket positions feed the rejection
//! sampler and the sums feed cumulative selection; rebuilding either from
//! rates on load would perturb low-order bits and break deterministic
//! resume.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod snapshot;

pub use error::CheckpointError;
pub use snapshot::{
    BucketState, FacetState, Fingerprint, KProcRecord, RateTable, SchedulerState, Snapshot,
    VoxelState,
};

/// Magic bytes at the start of every checkpoint file.
pub const MAGIC: [u8; 4] = *b"TSRA";

/// Current binary format version.
///
/// History:
/// - v1: initial layout (fingerprint, rate tables, element states,
///   scheduler, rng, clock)
pub const FORMAT_VERSION: u8 = 1;
