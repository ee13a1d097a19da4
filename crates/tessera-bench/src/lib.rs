//! Benchmark profiles and utilities for the Tessera simulation engine.
//!
//! Provides pre-built [`Solver`] profiles for benchmarking and examples:
//!
//! - [`reference_profile`]: 64-voxel reaction and diffusion line
//! - [`stress_profile`]: 1024-voxel line at the same rate densities
//! - [`init_voxel_counts`]: deterministic pool seeding via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tessera_core::{CompId, VoxelId};
use tessera_engine::Solver;
use tessera_mesh::{Mesh, MeshSpec, VoxelDecl};
use tessera_model::{CompDecl, DiffDecl, ModelSpec, ReacDecl, Statedef};

/// Voxel volume shared by all profiles, in m³.
const VOXEL_VOLUME: f64 = 1.0e-18;
/// Center-to-center distance of linked voxels, in m.
const LINK_DISTANCE: f64 = 1.0e-6;
/// Contact area of linked voxels, in m².
const LINK_AREA: f64 = 1.0e-13;

/// Build a reference benchmark profile: 64 voxels, busy scheduler.
///
/// Two species on a line: `A` is created (zero order), decays (first
/// order), pairs into `B` (second order), and both diffuse. The birth
/// keeps the total rate positive forever, so [`Solver::step`] never
/// stalls however long a benchmark iterates.
pub fn reference_profile(seed: u64) -> Solver {
    profile(64, seed)
}

/// Build a stress benchmark profile: 1024 voxels.
///
/// Same model and per-voxel seeding as [`reference_profile`] at 16x the
/// voxel count.
pub fn stress_profile(seed: u64) -> Solver {
    profile(1024, seed)
}

fn profile(nvoxels: u32, seed: u64) -> Solver {
    let mut m = ModelSpec::new();
    let a = m.add_species("A");
    let b = m.add_species("B");
    let birth = m.add_reac(ReacDecl {
        name: "birth".into(),
        lhs: vec![],
        rhs: vec![(a, 1)],
        kcst: 500.0,
    });
    let decay = m.add_reac(ReacDecl {
        name: "decay".into(),
        lhs: vec![(a, 1)],
        rhs: vec![],
        kcst: 5.0,
    });
    let pair = m.add_reac(ReacDecl {
        name: "pair".into(),
        lhs: vec![(a, 2)],
        rhs: vec![(b, 1)],
        kcst: 1.0e6,
    });
    let drain = m.add_reac(ReacDecl {
        name: "drain".into(),
        lhs: vec![(b, 1)],
        rhs: vec![],
        kcst: 10.0,
    });
    let da = m.add_diff(DiffDecl {
        name: "dA".into(),
        lig: a,
        dcst: 1.0e-10,
    });
    let db = m.add_diff(DiffDecl {
        name: "dB".into(),
        lig: b,
        dcst: 2.0e-11,
    });
    m.add_comp(CompDecl {
        name: "cyt".into(),
        reacs: vec![birth, decay, pair, drain],
        diffs: vec![da, db],
        ..Default::default()
    });
    let sd = Statedef::build(&m).unwrap();

    let mut ms = MeshSpec::new();
    for i in 0..nvoxels {
        let mut decl = VoxelDecl::new(CompId(0), VOXEL_VOLUME);
        if i > 0 {
            decl = decl.link(0, VoxelId(i - 1), LINK_DISTANCE, LINK_AREA);
        }
        if i + 1 < nvoxels {
            decl = decl.link(1, VoxelId(i + 1), LINK_DISTANCE, LINK_AREA);
        }
        ms.add_voxel(decl);
    }
    let mesh = Mesh::build(&sd, &ms).unwrap();

    let mut solver = Solver::new(sd, mesh, seed);
    for (i, &count) in init_voxel_counts(nvoxels, seed).iter().enumerate() {
        solver
            .set_voxel_count(VoxelId(i as u32), a, count)
            .unwrap();
    }
    solver
}

/// Generate deterministic initial per-voxel counts.
///
/// Spreads counts in `50..150` across the line using a simple hash of
/// the seed, so a profile is reproducible without consuming any of the
/// solver's own random stream.
pub fn init_voxel_counts(nvoxels: u32, seed: u64) -> Vec<u32> {
    (0..nvoxels)
        .map(|i| {
            let h = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(u64::from(i).wrapping_mul(1442695040888963407));
            50 + (h % 100) as u32
        })
        .collect()
}
