//! Shared model and mesh fixtures for Tessera development.
//!
//! Small, fully specified systems used across the test suites: a
//! birth-death process, a bimolecular association, pure diffusion on a
//! line, two non-interacting compartments, and a membrane with surface
//! kinetics and a voltage-gated channel. Each fixture returns a compiled
//! ([`Statedef`](tessera_model::Statedef), [`Mesh`](tessera_mesh::Mesh))
//! pair ready to hand to a solver; tests resolve ids by name.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    bimolecular, birth_death, diffusion_line, gate_close_rate, gate_open_rate, line_mesh,
    membrane, two_compartments, voltage_table, BIND_KCST, FACET_AREA, GATE_DV, GATE_VMAX,
    GATE_VMIN, LINK_AREA, LINK_DISTANCE, LINK_LENGTH, PUMP_DCST, RELEASE_KCST, VOXEL_VOLUME,
};
