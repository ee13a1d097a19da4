//! Parallel execution of independent realizations.
//!
//! Realizations never share mutable state, so an ensemble is embarrassingly
//! parallel: one solver per seed, fanned out over a fixed pool of worker
//! threads. Results travel back over a channel tagged with their seed index
//! and are reordered before returning, so the output is independent of
//! thread scheduling.

use std::thread;

use crate::error::SimError;
use crate::solver::Solver;

/// Run one realization per seed and collect a probe value from each.
///
/// `builder` constructs a fresh solver for a seed; `probe` reads the
/// result off a solver that has reached `end_time`. Workers pull seeds
/// from a shared queue, so uneven trajectories balance across however
/// many threads the host offers (capped at one per seed).
///
/// The returned vector is ordered by seed index. When several
/// realizations fail, the error of the lowest-indexed one is returned,
/// which keeps the outcome deterministic under scheduling.
pub fn run_ensemble<B, P, T>(
    builder: B,
    seeds: &[u64],
    end_time: f64,
    probe: P,
) -> Result<Vec<T>, SimError>
where
    B: Fn(u64) -> Solver + Sync,
    P: Fn(&Solver) -> T + Sync,
    T: Send,
{
    if !end_time.is_finite() {
        return Err(SimError::BadQuantity {
            what: "end time",
            value: end_time,
        });
    }
    if end_time < 0.0 {
        return Err(SimError::EndTimeBeforeCurrent {
            end: end_time,
            now: 0.0,
        });
    }
    if seeds.is_empty() {
        return Ok(Vec::new());
    }

    let workers = thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(seeds.len());

    let (task_tx, task_rx) = crossbeam_channel::bounded::<(usize, u64)>(seeds.len());
    let (result_tx, result_rx) =
        crossbeam_channel::bounded::<(usize, Result<T, SimError>)>(seeds.len());
    for (idx, &seed) in seeds.iter().enumerate() {
        // Capacity covers the whole queue and task_rx is still alive, so
        // the send neither blocks nor fails.
        let _ = task_tx.send((idx, seed));
    }
    drop(task_tx);

    let (results, first_err) = thread::scope(|scope| {
        for w in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let builder = &builder;
            let probe = &probe;
            thread::Builder::new()
                .name(format!("tessera-run-{w}"))
                .spawn_scoped(scope, move || {
                    while let Ok((idx, seed)) = task_rx.recv() {
                        let mut solver = builder(seed);
                        let out = solver.run(end_time).map(|()| probe(&solver));
                        if result_tx.send((idx, out)).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn ensemble worker");
        }
        drop(task_rx);
        drop(result_tx);

        let mut results: Vec<Option<T>> = (0..seeds.len()).map(|_| None).collect();
        let mut first_err: Option<(usize, SimError)> = None;
        for _ in 0..seeds.len() {
            // Disconnection here means a worker panicked; the scope will
            // propagate that panic once the closure returns.
            let Ok((idx, out)) = result_rx.recv() else {
                break;
            };
            match out {
                Ok(value) => results[idx] = Some(value),
                Err(err) => {
                    if first_err.as_ref().is_none_or(|(i, _)| idx < *i) {
                        first_err = Some((idx, err));
                    }
                }
            }
        }
        (results, first_err)
    });

    if let Some((_, err)) = first_err {
        return Err(err);
    }
    let mut out = Vec::with_capacity(results.len());
    for r in results {
        match r {
            Some(value) => out.push(value),
            None => unreachable!("ensemble result missing without an error"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{CompId, SpecId, VoxelId};
    use tessera_mesh::{Mesh, MeshSpec, VoxelDecl};
    use tessera_model::{CompDecl, ModelSpec, ReacDecl, Statedef};

    fn birth_death(seed: u64) -> Solver {
        let mut m = ModelSpec::new();
        let a = m.add_species("A");
        let birth = m.add_reac(ReacDecl {
            name: "birth".into(),
            lhs: vec![],
            rhs: vec![(a, 1)],
            kcst: 20.0,
        });
        let death = m.add_reac(ReacDecl {
            name: "death".into(),
            lhs: vec![(a, 1)],
            rhs: vec![],
            kcst: 1.0,
        });
        m.add_comp(CompDecl {
            name: "cyt".into(),
            reacs: vec![birth, death],
            ..Default::default()
        });
        let sd = Statedef::build(&m).unwrap();
        let mut ms = MeshSpec::new();
        ms.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        let mesh = Mesh::build(&sd, &ms).unwrap();
        Solver::new(sd, mesh, seed)
    }

    #[test]
    fn results_match_serial_runs_in_seed_order() {
        let seeds = [3u64, 1, 4, 1, 5, 9, 2, 6];
        let parallel = run_ensemble(birth_death, &seeds, 0.5, |s| {
            s.voxel_count(VoxelId(0), SpecId(0)).unwrap()
        })
        .unwrap();

        let serial: Vec<u32> = seeds
            .iter()
            .map(|&seed| {
                let mut s = birth_death(seed);
                s.run(0.5).unwrap();
                s.voxel_count(VoxelId(0), SpecId(0)).unwrap()
            })
            .collect();
        assert_eq!(parallel, serial);
    }

    #[test]
    fn repeated_ensembles_are_identical() {
        let seeds = [11u64, 12, 13, 14];
        let probe = |s: &Solver| (s.steps(), s.voxel_count(VoxelId(0), SpecId(0)).unwrap());
        let first = run_ensemble(birth_death, &seeds, 0.25, probe).unwrap();
        let second = run_ensemble(birth_death, &seeds, 0.25, probe).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_seed_list_is_a_no_op() {
        let out = run_ensemble(birth_death, &[], 1.0, |s| s.steps()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn bad_end_times_are_rejected_up_front() {
        assert!(matches!(
            run_ensemble(birth_death, &[1, 2], f64::NAN, |s| s.steps()),
            Err(SimError::BadQuantity { what: "end time", .. })
        ));
        assert!(matches!(
            run_ensemble(birth_death, &[1, 2], -1.0, |s| s.steps()),
            Err(SimError::EndTimeBeforeCurrent { .. })
        ));
    }
}
