//! Statistical behavior of the exact solver.
//!
//! Every test uses a fixed seed and generous tolerances: the assertions
//! hold with overwhelming probability under correct sampling, and the
//! fixed seed makes each run reproducible rather than flaky.

use tessera_core::{CompId, SpecId, VoxelId};
use tessera_engine::{run_ensemble, Solver};
use tessera_test_utils::{bimolecular, birth_death, diffusion_line};

// ── Helpers ─────────────────────────────────────────────────────────────

fn spec(s: &Solver, name: &str) -> SpecId {
    s.statedef().spec_by_name(name).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────────

/// A pure birth process fires at a constant total rate, so its waiting
/// times are i.i.d. exponential with mean and standard deviation `1/rate`.
#[test]
fn waiting_times_are_exponential() {
    const RATE: f64 = 100.0;
    let (sd, mesh) = birth_death(1, RATE, 0.0);
    let mut s = Solver::new(sd, mesh, 0x5eed);

    let n = 2000;
    let mut dts = Vec::with_capacity(n);
    let mut last = 0.0;
    for _ in 0..n {
        assert!(s.step());
        dts.push(s.time() - last);
        last = s.time();
    }

    let mean = dts.iter().sum::<f64>() / n as f64;
    let var = dts.iter().map(|dt| (dt - mean) * (dt - mean)).sum::<f64>() / (n - 1) as f64;
    let expected_mean = 1.0 / RATE;
    assert!(
        (mean - expected_mean).abs() < 0.10 * expected_mean,
        "sample mean {mean} too far from {expected_mean}"
    );
    // Exponential: variance equals the squared mean.
    assert!(
        (var - expected_mean * expected_mean).abs() < 0.25 * expected_mean * expected_mean,
        "sample variance {var} not consistent with an exponential"
    );
    // Scale invariance: every waiting time is positive.
    assert!(dts.iter().all(|&dt| dt > 0.0));
}

/// Birth-death equilibrates to a Poisson stationary law with mean
/// `birth/death`; an ensemble average over seeds lands near it.
#[test]
fn birth_death_reaches_its_stationary_mean() {
    const BIRTH: f64 = 200.0;
    const DEATH: f64 = 2.0;
    let seeds: Vec<u64> = (0..64).map(|i| 1000 + i).collect();
    let counts = run_ensemble(
        |seed| {
            let (sd, mesh) = birth_death(1, BIRTH, DEATH);
            Solver::new(sd, mesh, seed)
        },
        &seeds,
        3.0,
        |s| s.voxel_count(VoxelId(0), spec(s, "A")).unwrap(),
    )
    .unwrap();

    let mean = counts.iter().map(|&c| f64::from(c)).sum::<f64>() / counts.len() as f64;
    let expected = BIRTH / DEATH;
    // Poisson sd is 10; the ensemble mean has sd 10/sqrt(64) = 1.25.
    assert!(
        (mean - expected).abs() < 8.0,
        "ensemble mean {mean} too far from {expected}"
    );
}

/// Association consumes one A and one B per C produced, at every point of
/// the trajectory.
#[test]
fn bimolecular_association_conserves_pairings() {
    let (sd, mesh) = bimolecular(1.0e8);
    let mut s = Solver::new(sd, mesh, 77);
    let (a, b, c) = (spec(&s, "A"), spec(&s, "B"), spec(&s, "C"));
    s.set_voxel_count(VoxelId(0), a, 1000).unwrap();
    s.set_voxel_count(VoxelId(0), b, 800).unwrap();

    let mut t = 0.0;
    for _ in 0..5 {
        t += 2.0e-3;
        s.run(t).unwrap();
        let na = s.voxel_count(VoxelId(0), a).unwrap();
        let nb = s.voxel_count(VoxelId(0), b).unwrap();
        let nc = s.voxel_count(VoxelId(0), c).unwrap();
        assert_eq!(na + nc, 1000);
        assert_eq!(nb + nc, 800);
    }
    // The reaction actually ran.
    assert!(s.voxel_count(VoxelId(0), c).unwrap() > 0);
    assert_eq!(
        u64::from(s.voxel_count(VoxelId(0), c).unwrap()),
        s.comp_reac_extent(CompId(0), s.statedef().reac_by_name("assoc").unwrap())
            .unwrap()
    );
}

/// Hops move molecules between voxels without creating or destroying
/// them, and a point source relaxes toward a flat profile.
#[test]
fn diffusion_conserves_and_spreads() {
    const N: u32 = 16;
    let (sd, mesh) = diffusion_line(N, 1.0e-10);
    let mut s = Solver::new(sd, mesh, 4242);
    let a = spec(&s, "A");
    s.set_voxel_count(VoxelId(0), a, 600).unwrap();

    let mut t = 0.0;
    for _ in 0..4 {
        t += 1.5;
        s.run(t).unwrap();
        assert_eq!(s.comp_count(CompId(0), a).unwrap(), 600);
    }

    // Well past the mixing time every voxel sits near 600/16 = 37.5.
    for v in 0..N {
        let count = s.voxel_count(VoxelId(v), a).unwrap();
        assert!(
            (5..=100).contains(&count),
            "voxel {v} holds {count} molecules, profile has not flattened"
        );
    }
    assert!(s.steps() > 10_000);
}
