//! Tessera: a spatial stochastic reaction-diffusion simulation engine.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tessera sub-crates. For most users, adding `tessera` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! // A birth-death process: molecules of A appear at 1000 per second
//! // and each decays at 1 per second.
//! let mut model = ModelSpec::new();
//! let a = model.add_species("A");
//! let birth = model.add_reac(ReacDecl {
//!     name: "birth".into(),
//!     lhs: vec![],
//!     rhs: vec![(a, 1)],
//!     kcst: 1000.0,
//! });
//! let decay = model.add_reac(ReacDecl {
//!     name: "decay".into(),
//!     lhs: vec![(a, 1)],
//!     rhs: vec![],
//!     kcst: 1.0,
//! });
//! model.add_comp(CompDecl {
//!     name: "cyt".into(),
//!     reacs: vec![birth, decay],
//!     ..Default::default()
//! });
//! let statedef = Statedef::build(&model).unwrap();
//!
//! // One cubic-micrometer voxel.
//! let mut mesh_spec = MeshSpec::new();
//! mesh_spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
//! let mesh = Mesh::build(&statedef, &mesh_spec).unwrap();
//!
//! // Simulate one second and read the population back.
//! let mut solver = Solver::new(statedef, mesh, 42);
//! solver.run(1.0).unwrap();
//! assert_eq!(solver.time(), 1.0);
//! assert!(solver.steps() > 0);
//! let count = solver.comp_count(CompId(0), a).unwrap();
//! assert!(count > 0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessera-core` | IDs, the counter-based RNG, physical constants |
//! | [`model`] | `tessera-model` | Model declarations and the compiled definition registry |
//! | [`mesh`] | `tessera-mesh` | Voxel and facet state over a fixed topology |
//! | [`kproc`] | `tessera-kproc` | Kinetic process instances and dependency analysis |
//! | [`engine`] | `tessera-engine` | The event-driven solver and the ensemble driver |
//! | [`checkpoint`] | `tessera-checkpoint` | Snapshot model and binary image codec |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, the counter-based RNG, and physical constants
/// (`tessera-core`).
///
/// Contains the id newtypes every other crate indexes with, the
/// [`types::SimRng`] stream the solver draws from, and
/// [`types::AVOGADRO`].
pub use tessera_core as types;

/// Model declarations and the compiled definition registry
/// (`tessera-model`).
///
/// Assemble a [`model::ModelSpec`] from declarations, then compile it
/// with [`model::Statedef::build`] into the immutable registry the
/// solver runs against.
pub use tessera_model as model;

/// Voxel and facet state over a fixed topology (`tessera-mesh`).
///
/// Build a [`mesh::MeshSpec`] from voxel and facet declarations and
/// compile it with [`mesh::Mesh::build`]. The mesh owns every molecule
/// count, clamp flag, and membrane potential during a simulation.
pub use tessera_mesh as mesh;

/// Kinetic process instances and dependency analysis (`tessera-kproc`).
///
/// One [`kproc::KProc`] per reaction, diffusion hop, or transition per
/// host element; [`kproc::setup_deps`] derives the static
/// recompute-after-firing graph.
pub use tessera_kproc as kproc;

/// The event-driven solver and the ensemble driver (`tessera-engine`).
///
/// [`engine::Solver`] owns one realization end to end;
/// [`engine::run_ensemble`] fans independent realizations out across
/// threads deterministically.
pub use tessera_engine as engine;

/// Snapshot model and binary image codec (`tessera-checkpoint`).
///
/// The [`checkpoint::Snapshot`] captured by [`engine::Solver::checkpoint`]
/// restores bit-for-bit: a resumed run replays the original draw for
/// draw.
pub use tessera_checkpoint as checkpoint;

/// Common imports for typical Tessera usage.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
///
/// This imports the most frequently used types: model and mesh
/// declarations, identifiers, the solver, the ensemble driver, and the
/// error types they return.
pub mod prelude {
    // Model declarations
    pub use tessera_model::{
        CompDecl, DiffDecl, ModelSpec, PatchDecl, ReacDecl, SDiffDecl, SReacDecl, Statedef,
        VDepTransDecl,
    };

    // Mesh construction
    pub use tessera_mesh::{FacetDecl, Mesh, MeshSpec, VoxelDecl};

    // Identifiers
    pub use tessera_core::{CompId, FacetId, PatchId, SpecId, VoxelId};

    // Errors
    pub use tessera_checkpoint::CheckpointError;
    pub use tessera_engine::SimError;
    pub use tessera_mesh::MeshError;
    pub use tessera_model::ModelError;

    // Solver
    pub use tessera_engine::{run_ensemble, SchedulerDiagnostics, Solver};
}
