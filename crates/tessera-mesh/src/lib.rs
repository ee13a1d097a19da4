//! Discretized geometry for the Tessera stochastic reaction-diffusion
//! engine.
//!
//! A simulation volume is described as a [`MeshSpec`]: tetrahedral voxels
//! assigned to compartments, and triangular membrane facets assigned to
//! patches, with explicit adjacency and coupling measurements. It is
//! compiled against a [`Statedef`](tessera_model::Statedef) by
//! [`Mesh::build`], which sizes each element's molecule pools from its
//! container's local species space and freezes the topology.
//!
//! Topology never changes after build. Adjacency slots are directed: a
//! voxel's slot describes transport out of that voxel through one of its
//! (at most four) faces, and a facet's slot describes transport across one
//! of its (at most three) edges. Molecule counts, clamp flags, and facet
//! potentials are the only mutable state.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod facet;
pub mod mesh;
pub mod spec;
pub mod voxel;

pub use error::MeshError;
pub use facet::Facet;
pub use mesh::Mesh;
pub use spec::{FacetDecl, MeshSpec, VoxelDecl};
pub use voxel::Voxel;
