//! The spatial stochastic solver: construction, the event loop, the state
//! access surface, and checkpointing.
//!
//! The solver owns everything a single realization needs: the compiled
//! model, the mesh, the instantiated kinetic processes, the dependency
//! graph, the selection structure and the random source. Public methods
//! validate their arguments and return [`SimError`]; once past validation,
//! internal layers assert their invariants instead of re-checking.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tessera_checkpoint::{
    CheckpointError, FacetState, Fingerprint, KProcRecord, RateTable, Snapshot, VoxelState,
};
use tessera_core::consts::AVOGADRO;
use tessera_core::{
    CompId, DiffId, FacetId, KProcId, LocalSpecId, PatchId, ReacId, SDiffId, SReacId, SimRng,
    SpecId, VoxelId,
};
use tessera_kproc::{setup_deps, Activity, Diff, KProc, Reac, SDiff, SReac, VDepTrans};
use tessera_mesh::Mesh;
use tessera_model::Statedef;

use crate::error::SimError;
use crate::sched::{Scheduler, SchedulerDiagnostics};

/// One realization of a spatial stochastic reaction-diffusion system.
///
/// Construction instantiates every kinetic process the model and mesh
/// imply, in a fixed anchor order the checkpoint format relies on: voxels
/// in id order (each voxel's reactions in its compartment's anchored
/// order, then for each diffusion rule the outbound hop per linked
/// same-compartment neighbor slot), then facets in id order (surface
/// reactions, surface hops, voltage transitions). Every process is
/// registered on the element whose pools its propensity reads, which is
/// what the dependency builder and the refresh helpers key off.
pub struct Solver {
    statedef: Statedef,
    mesh: Mesh,
    kprocs: Vec<KProc>,
    deps: Vec<Box<[KProcId]>>,
    sched: Scheduler,
    rng: SimRng,
    time: f64,
    nsteps: u64,
}

fn check_index(kind: &'static str, index: u32, limit: u32) -> Result<(), SimError> {
    if index >= limit {
        return Err(SimError::IndexOutOfRange { kind, index, limit });
    }
    Ok(())
}

fn check_rate_const(value: f64) -> Result<(), SimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::BadRateConstant { value });
    }
    Ok(())
}

/// Convert a mole amount to a whole molecule count, round-to-nearest.
fn amount_to_count(amount: f64) -> Result<f64, SimError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(SimError::BadQuantity {
            what: "amount",
            value: amount,
        });
    }
    Ok((amount * AVOGADRO).round())
}

impl Solver {
    // ── Construction ────────────────────────────────────────────────────

    /// Build a solver over a compiled model and mesh, seeding the random
    /// source from `seed`.
    ///
    /// Infallible: both inputs already validated everything when they were
    /// built. Initial populations are zero everywhere, so the only
    /// processes scheduled at start are zero-order creations.
    pub fn new(statedef: Statedef, mut mesh: Mesh, seed: u64) -> Self {
        let mut kprocs: Vec<KProc> = Vec::new();

        for v in 0..mesh.nvoxels() {
            let vid = VoxelId(v);
            let comp = mesh.voxel(vid).comp();
            let compdef = statedef.comp(comp);
            for (pos, &rid) in compdef.reacs().iter().enumerate() {
                let kid = KProcId(kprocs.len() as u32);
                mesh.voxel_mut(vid).add_kproc(kid);
                let k = Reac::new(kid, statedef.reac(rid), &statedef, &mesh, vid, compdef.kcst(pos));
                kprocs.push(KProc::Reac(k));
            }
            for (pos, &did) in compdef.diffs().iter().enumerate() {
                let def = statedef.diff(did);
                let dcst = compdef.dcst(pos);
                for slot in 0..4 {
                    let Some(dst) = mesh.voxel(vid).neighbors()[slot] else {
                        continue;
                    };
                    if mesh.voxel(dst).comp() != comp {
                        continue;
                    }
                    let kid = KProcId(kprocs.len() as u32);
                    mesh.voxel_mut(vid).add_kproc(kid);
                    let k = Diff::new(kid, def, &statedef, &mesh, vid, dst, slot, dcst);
                    kprocs.push(KProc::Diff(k));
                }
            }
        }

        for f in 0..mesh.nfacets() {
            let fid = FacetId(f);
            let patch = mesh.facet(fid).patch();
            let patchdef = statedef.patch(patch);
            for (pos, &sid) in patchdef.sreacs().iter().enumerate() {
                let kid = KProcId(kprocs.len() as u32);
                mesh.facet_mut(fid).add_kproc(kid);
                let k = SReac::new(kid, statedef.sreac(sid), &statedef, &mesh, fid, patchdef.kcst(pos));
                kprocs.push(KProc::SReac(k));
            }
            for (pos, &did) in patchdef.sdiffs().iter().enumerate() {
                let def = statedef.sdiff(did);
                let dcst = patchdef.dcst(pos);
                for slot in 0..3 {
                    let Some(dst) = mesh.facet(fid).neighbors()[slot] else {
                        continue;
                    };
                    if mesh.facet(dst).patch() != patch {
                        continue;
                    }
                    let kid = KProcId(kprocs.len() as u32);
                    mesh.facet_mut(fid).add_kproc(kid);
                    let k = SDiff::new(kid, def, &statedef, &mesh, fid, dst, slot, dcst);
                    kprocs.push(KProc::SDiff(k));
                }
            }
            for &tid in patchdef.vdep_trans() {
                let kid = KProcId(kprocs.len() as u32);
                mesh.facet_mut(fid).add_kproc(kid);
                let k = VDepTrans::new(kid, tid, &statedef, &mesh, fid);
                kprocs.push(KProc::VDepTrans(k));
            }
        }

        let deps = setup_deps(&statedef, &mesh, &kprocs);
        let sched = Scheduler::new(kprocs.len());
        let mut solver = Self {
            statedef,
            mesh,
            kprocs,
            deps,
            sched,
            rng: SimRng::new(seed),
            time: 0.0,
            nsteps: 0,
        };
        solver.full_refresh();
        solver
    }

    /// The compiled model definitions, for name resolution.
    pub fn statedef(&self) -> &Statedef {
        &self.statedef
    }

    /// The simulation mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    // ── Clock ───────────────────────────────────────────────────────────

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of events fired since construction or the last reset or
    /// restore.
    pub fn steps(&self) -> u64 {
        self.nsteps
    }

    /// Fire exactly one event, if any process can fire.
    ///
    /// Returns `false` without consuming a draw when the total rate is
    /// zero; the clock does not move in that case.
    pub fn step(&mut self) -> bool {
        let total = self.sched.total();
        if total <= 0.0 {
            return false;
        }
        let dt = self.rng.exp_variate(total);
        self.time += dt;
        let kid = self.sched.select(&mut self.rng);
        self.fire(kid);
        self.nsteps += 1;
        true
    }

    /// Run until the simulation clock reaches `end_time`.
    ///
    /// When the total rate drops to zero, or the next waiting time would
    /// overshoot, the clock jumps straight to `end_time` without firing.
    /// The overshooting waiting-time draw is consumed and discarded, which
    /// is what makes a run to `t1` followed by a run to `t2` reproduce a
    /// single run to `t2` draw for draw.
    pub fn run(&mut self, end_time: f64) -> Result<(), SimError> {
        if !end_time.is_finite() {
            return Err(SimError::BadQuantity {
                what: "end time",
                value: end_time,
            });
        }
        if end_time < self.time {
            return Err(SimError::EndTimeBeforeCurrent {
                end: end_time,
                now: self.time,
            });
        }
        loop {
            let total = self.sched.total();
            if total <= 0.0 {
                self.time = end_time;
                break;
            }
            let dt = self.rng.exp_variate(total);
            if self.time + dt > end_time {
                self.time = end_time;
                break;
            }
            self.time += dt;
            let kid = self.sched.select(&mut self.rng);
            self.fire(kid);
            self.nsteps += 1;
        }
        Ok(())
    }

    /// Run for a further `dt` seconds of simulated time.
    pub fn advance(&mut self, dt: f64) -> Result<(), SimError> {
        if !dt.is_finite() {
            return Err(SimError::BadQuantity {
                what: "time window",
                value: dt,
            });
        }
        if dt < 0.0 {
            return Err(SimError::NegativeWindow { dt });
        }
        self.run(self.time + dt)
    }

    /// Return the solver to its just-built state: empty pools, cleared
    /// clamps, model-default constants, initial potentials, active
    /// processes, zeroed extents and clock.
    ///
    /// The random source keeps its position in the stream; reseed by
    /// building a fresh solver when runs must be draw-identical.
    pub fn reset(&mut self) {
        for v in 0..self.mesh.nvoxels() {
            let vid = VoxelId(v);
            let nspecs = self.statedef.comp(self.mesh.voxel(vid).comp()).nspecs();
            let voxel = self.mesh.voxel_mut(vid);
            for s in 0..nspecs {
                voxel.set_count(LocalSpecId(s), 0);
                voxel.set_clamped(LocalSpecId(s), false);
            }
        }
        for f in 0..self.mesh.nfacets() {
            let fid = FacetId(f);
            let patchdef = self.statedef.patch(self.mesh.facet(fid).patch());
            let nspecs = patchdef.nspecs();
            let init = patchdef.init_potential();
            let facet = self.mesh.facet_mut(fid);
            facet.set_potential(init);
            for s in 0..nspecs {
                facet.set_count(LocalSpecId(s), 0);
                facet.set_clamped(LocalSpecId(s), false);
            }
        }
        self.statedef.reset_constants();
        for i in 0..self.kprocs.len() {
            let default = self.default_rate_const(&self.kprocs[i]);
            let k = &mut self.kprocs[i];
            if let Some(value) = default {
                k.set_rate_const(value);
            }
            k.load_counters(0, Activity::Active);
        }
        self.sched.clear();
        self.full_refresh();
        self.time = 0.0;
        self.nsteps = 0;
    }

    // ── Per-voxel populations ───────────────────────────────────────────

    /// Molecule count of `spec` in one voxel.
    pub fn voxel_count(&self, voxel: VoxelId, spec: SpecId) -> Result<u32, SimError> {
        let local = self.voxel_local_spec(voxel, spec)?;
        Ok(self.mesh.voxel(voxel).count(local))
    }

    /// Overwrite the molecule count of `spec` in one voxel and refresh
    /// every rate that reads it.
    pub fn set_voxel_count(
        &mut self,
        voxel: VoxelId,
        spec: SpecId,
        count: u32,
    ) -> Result<(), SimError> {
        let local = self.voxel_local_spec(voxel, spec)?;
        self.mesh.voxel_mut(voxel).set_count(local, count);
        self.refresh_voxel(voxel);
        Ok(())
    }

    /// Amount of `spec` in one voxel, in moles.
    pub fn voxel_amount(&self, voxel: VoxelId, spec: SpecId) -> Result<f64, SimError> {
        Ok(f64::from(self.voxel_count(voxel, spec)?) / AVOGADRO)
    }

    /// Set the amount of `spec` in one voxel, in moles; rounds to the
    /// nearest whole molecule.
    pub fn set_voxel_amount(
        &mut self,
        voxel: VoxelId,
        spec: SpecId,
        amount: f64,
    ) -> Result<(), SimError> {
        let requested = amount_to_count(amount)?;
        if requested > f64::from(u32::MAX) {
            return Err(SimError::CountOverflow { requested });
        }
        self.set_voxel_count(voxel, spec, requested as u32)
    }

    /// Concentration of `spec` in one voxel, in mol/L.
    pub fn voxel_conc(&self, voxel: VoxelId, spec: SpecId) -> Result<f64, SimError> {
        let local = self.voxel_local_spec(voxel, spec)?;
        let v = self.mesh.voxel(voxel);
        Ok(f64::from(v.count(local)) / (1.0e3 * AVOGADRO * v.volume()))
    }

    /// Set the concentration of `spec` in one voxel, in mol/L; rounds to
    /// the nearest whole molecule.
    pub fn set_voxel_conc(
        &mut self,
        voxel: VoxelId,
        spec: SpecId,
        conc: f64,
    ) -> Result<(), SimError> {
        let local = self.voxel_local_spec(voxel, spec)?;
        if !conc.is_finite() || conc < 0.0 {
            return Err(SimError::BadQuantity {
                what: "concentration",
                value: conc,
            });
        }
        let requested = (conc * 1.0e3 * AVOGADRO * self.mesh.voxel(voxel).volume()).round();
        if requested > f64::from(u32::MAX) {
            return Err(SimError::CountOverflow { requested });
        }
        self.mesh.voxel_mut(voxel).set_count(local, requested as u32);
        self.refresh_voxel(voxel);
        Ok(())
    }

    /// Whether `spec` is clamped in one voxel.
    pub fn voxel_clamped(&self, voxel: VoxelId, spec: SpecId) -> Result<bool, SimError> {
        let local = self.voxel_local_spec(voxel, spec)?;
        Ok(self.mesh.voxel(voxel).clamped(local))
    }

    /// Clamp or release `spec` in one voxel. A clamped pool ignores every
    /// reaction and diffusion update but still accepts explicit writes.
    pub fn set_voxel_clamped(
        &mut self,
        voxel: VoxelId,
        spec: SpecId,
        clamped: bool,
    ) -> Result<(), SimError> {
        let local = self.voxel_local_spec(voxel, spec)?;
        self.mesh.voxel_mut(voxel).set_clamped(local, clamped);
        Ok(())
    }

    /// Volume of one voxel, in cubic meters.
    pub fn voxel_volume(&self, voxel: VoxelId) -> Result<f64, SimError> {
        check_index("voxel", voxel.0, self.mesh.nvoxels())?;
        Ok(self.mesh.voxel(voxel).volume())
    }

    // ── Per-voxel processes ─────────────────────────────────────────────

    /// Nominal rate constant of one reaction instance.
    pub fn voxel_reac_kcst(&self, voxel: VoxelId, reac: ReacId) -> Result<f64, SimError> {
        let kid = self.voxel_reac(voxel, reac)?;
        Ok(self.kprocs[kid.0 as usize].rate_const())
    }

    /// Replace the nominal rate constant of one reaction instance,
    /// rescaling its stochastic constant and its scheduled rate. The
    /// compartment default is untouched.
    pub fn set_voxel_reac_kcst(
        &mut self,
        voxel: VoxelId,
        reac: ReacId,
        kcst: f64,
    ) -> Result<(), SimError> {
        check_rate_const(kcst)?;
        let kid = self.voxel_reac(voxel, reac)?;
        self.rewrite_rate_const(kid, kcst);
        Ok(())
    }

    /// Whether one reaction instance is active.
    pub fn voxel_reac_active(&self, voxel: VoxelId, reac: ReacId) -> Result<bool, SimError> {
        let kid = self.voxel_reac(voxel, reac)?;
        Ok(self.kprocs[kid.0 as usize].activity().is_active())
    }

    /// Activate or deactivate one reaction instance. Inactive processes
    /// report rate zero and never fire.
    pub fn set_voxel_reac_active(
        &mut self,
        voxel: VoxelId,
        reac: ReacId,
        active: bool,
    ) -> Result<(), SimError> {
        let kid = self.voxel_reac(voxel, reac)?;
        self.rewrite_activity(kid, active);
        Ok(())
    }

    /// How many times one reaction instance has fired.
    pub fn voxel_reac_extent(&self, voxel: VoxelId, reac: ReacId) -> Result<u64, SimError> {
        let kid = self.voxel_reac(voxel, reac)?;
        Ok(self.kprocs[kid.0 as usize].extent())
    }

    /// Diffusion constant governing `diff`'s hops out of one voxel.
    pub fn voxel_diff_dcst(&self, voxel: VoxelId, diff: DiffId) -> Result<f64, SimError> {
        let hops = self.voxel_diff_hops(voxel, diff)?;
        Ok(self.kprocs[hops[0].0 as usize].rate_const())
    }

    /// Replace the diffusion constant of every hop of `diff` out of one
    /// voxel. The compartment default is untouched.
    pub fn set_voxel_diff_dcst(
        &mut self,
        voxel: VoxelId,
        diff: DiffId,
        dcst: f64,
    ) -> Result<(), SimError> {
        check_rate_const(dcst)?;
        let hops = self.voxel_diff_hops(voxel, diff)?;
        for kid in hops {
            self.rewrite_rate_const(kid, dcst);
        }
        Ok(())
    }

    // ── Per-facet populations ───────────────────────────────────────────

    /// Molecule count of `spec` on one facet.
    pub fn facet_count(&self, facet: FacetId, spec: SpecId) -> Result<u32, SimError> {
        let local = self.facet_local_spec(facet, spec)?;
        Ok(self.mesh.facet(facet).count(local))
    }

    /// Overwrite the molecule count of `spec` on one facet and refresh
    /// every rate that reads it.
    pub fn set_facet_count(
        &mut self,
        facet: FacetId,
        spec: SpecId,
        count: u32,
    ) -> Result<(), SimError> {
        let local = self.facet_local_spec(facet, spec)?;
        self.mesh.facet_mut(facet).set_count(local, count);
        self.refresh_facet(facet);
        Ok(())
    }

    /// Amount of `spec` on one facet, in moles.
    pub fn facet_amount(&self, facet: FacetId, spec: SpecId) -> Result<f64, SimError> {
        Ok(f64::from(self.facet_count(facet, spec)?) / AVOGADRO)
    }

    /// Set the amount of `spec` on one facet, in moles; rounds to the
    /// nearest whole molecule.
    pub fn set_facet_amount(
        &mut self,
        facet: FacetId,
        spec: SpecId,
        amount: f64,
    ) -> Result<(), SimError> {
        let requested = amount_to_count(amount)?;
        if requested > f64::from(u32::MAX) {
            return Err(SimError::CountOverflow { requested });
        }
        self.set_facet_count(facet, spec, requested as u32)
    }

    /// Whether `spec` is clamped on one facet.
    pub fn facet_clamped(&self, facet: FacetId, spec: SpecId) -> Result<bool, SimError> {
        let local = self.facet_local_spec(facet, spec)?;
        Ok(self.mesh.facet(facet).clamped(local))
    }

    /// Clamp or release `spec` on one facet.
    pub fn set_facet_clamped(
        &mut self,
        facet: FacetId,
        spec: SpecId,
        clamped: bool,
    ) -> Result<(), SimError> {
        let local = self.facet_local_spec(facet, spec)?;
        self.mesh.facet_mut(facet).set_clamped(local, clamped);
        Ok(())
    }

    /// Area of one facet, in square meters.
    pub fn facet_area(&self, facet: FacetId) -> Result<f64, SimError> {
        check_index("facet", facet.0, self.mesh.nfacets())?;
        Ok(self.mesh.facet(facet).area())
    }

    /// Membrane potential across one facet, in volts.
    pub fn facet_potential(&self, facet: FacetId) -> Result<f64, SimError> {
        check_index("facet", facet.0, self.mesh.nfacets())?;
        Ok(self.mesh.facet(facet).potential())
    }

    /// Set the membrane potential across one facet and refresh its
    /// voltage-dependent rates.
    ///
    /// Rejected before any mutation when the value falls outside the
    /// tabulated range of any transition on the facet's patch.
    pub fn set_facet_potential(&mut self, facet: FacetId, potential: f64) -> Result<(), SimError> {
        check_index("facet", facet.0, self.mesh.nfacets())?;
        self.check_potential(self.mesh.facet(facet).patch(), potential)?;
        self.mesh.facet_mut(facet).set_potential(potential);
        self.refresh_facet(facet);
        Ok(())
    }

    // ── Per-facet processes ─────────────────────────────────────────────

    /// Nominal rate constant of one surface reaction instance.
    pub fn facet_sreac_kcst(&self, facet: FacetId, sreac: SReacId) -> Result<f64, SimError> {
        let kid = self.facet_sreac(facet, sreac)?;
        Ok(self.kprocs[kid.0 as usize].rate_const())
    }

    /// Replace the nominal rate constant of one surface reaction
    /// instance. The patch default is untouched.
    pub fn set_facet_sreac_kcst(
        &mut self,
        facet: FacetId,
        sreac: SReacId,
        kcst: f64,
    ) -> Result<(), SimError> {
        check_rate_const(kcst)?;
        let kid = self.facet_sreac(facet, sreac)?;
        self.rewrite_rate_const(kid, kcst);
        Ok(())
    }

    /// Whether one surface reaction instance is active.
    pub fn facet_sreac_active(&self, facet: FacetId, sreac: SReacId) -> Result<bool, SimError> {
        let kid = self.facet_sreac(facet, sreac)?;
        Ok(self.kprocs[kid.0 as usize].activity().is_active())
    }

    /// Activate or deactivate one surface reaction instance.
    pub fn set_facet_sreac_active(
        &mut self,
        facet: FacetId,
        sreac: SReacId,
        active: bool,
    ) -> Result<(), SimError> {
        let kid = self.facet_sreac(facet, sreac)?;
        self.rewrite_activity(kid, active);
        Ok(())
    }

    /// How many times one surface reaction instance has fired.
    pub fn facet_sreac_extent(&self, facet: FacetId, sreac: SReacId) -> Result<u64, SimError> {
        let kid = self.facet_sreac(facet, sreac)?;
        Ok(self.kprocs[kid.0 as usize].extent())
    }

    // ── Per-compartment aggregates ──────────────────────────────────────

    /// Total volume of a compartment, in cubic meters.
    pub fn comp_volume(&self, comp: CompId) -> Result<f64, SimError> {
        check_index("compartment", comp.0, self.statedef.ncomps())?;
        Ok(self.mesh.comp_vol(comp))
    }

    /// Total molecule count of `spec` across a compartment's voxels.
    pub fn comp_count(&self, comp: CompId, spec: SpecId) -> Result<u64, SimError> {
        let local = self.comp_local_spec(comp, spec)?;
        Ok(self
            .mesh
            .comp_voxels(comp)
            .iter()
            .map(|&v| u64::from(self.mesh.voxel(v).count(local)))
            .sum())
    }

    /// Distribute a total molecule count of `spec` over a compartment.
    ///
    /// Each voxel first receives the whole-number floor of its volume
    /// share; the remaining molecules are placed one at a time by
    /// volume-weighted draws from the solver's random source, so the
    /// distribution is reproducible under the seed but varies between
    /// seeds the way the original sampling did.
    pub fn set_comp_count(&mut self, comp: CompId, spec: SpecId, count: u64) -> Result<(), SimError> {
        let local = self.comp_local_spec(comp, spec)?;
        let voxels: Vec<VoxelId> = self.mesh.comp_voxels(comp).to_vec();
        let total_vol = self.mesh.comp_vol(comp);

        let mut counts: Vec<u32> = Vec::with_capacity(voxels.len());
        let mut assigned: u64 = 0;
        for &vid in &voxels {
            let share = (count as f64 * self.mesh.voxel(vid).volume() / total_vol).floor();
            if share > f64::from(u32::MAX) {
                return Err(SimError::CountOverflow { requested: share });
            }
            counts.push(share as u32);
            assigned += share as u64;
        }
        // Check the worst-case per-voxel total before consuming any
        // draws, so an overflow error leaves the stream untouched.
        let remainder = count.saturating_sub(assigned);
        for &base in &counts {
            if u64::from(base) + remainder > u64::from(u32::MAX) {
                return Err(SimError::CountOverflow {
                    requested: (u64::from(base) + remainder) as f64,
                });
            }
        }
        for _ in 0..remainder {
            let target = self.rng.uniform_f64() * total_vol;
            let mut acc = 0.0;
            let mut idx = voxels.len() - 1;
            for (i, &vid) in voxels.iter().enumerate() {
                acc += self.mesh.voxel(vid).volume();
                if target < acc {
                    idx = i;
                    break;
                }
            }
            counts[idx] += 1;
        }

        for (i, &vid) in voxels.iter().enumerate() {
            self.mesh.voxel_mut(vid).set_count(local, counts[i]);
        }
        for &vid in &voxels {
            self.refresh_voxel(vid);
        }
        Ok(())
    }

    /// Total amount of `spec` in a compartment, in moles.
    pub fn comp_amount(&self, comp: CompId, spec: SpecId) -> Result<f64, SimError> {
        Ok(self.comp_count(comp, spec)? as f64 / AVOGADRO)
    }

    /// Distribute an amount of `spec` over a compartment, in moles.
    pub fn set_comp_amount(&mut self, comp: CompId, spec: SpecId, amount: f64) -> Result<(), SimError> {
        let requested = amount_to_count(amount)?;
        if requested >= u64::MAX as f64 {
            return Err(SimError::CountOverflow { requested });
        }
        self.set_comp_count(comp, spec, requested as u64)
    }

    /// Concentration of `spec` over a whole compartment, in mol/L.
    pub fn comp_conc(&self, comp: CompId, spec: SpecId) -> Result<f64, SimError> {
        let count = self.comp_count(comp, spec)?;
        Ok(count as f64 / (1.0e3 * AVOGADRO * self.mesh.comp_vol(comp)))
    }

    /// Distribute a compartment-wide concentration of `spec`, in mol/L.
    pub fn set_comp_conc(&mut self, comp: CompId, spec: SpecId, conc: f64) -> Result<(), SimError> {
        check_index("compartment", comp.0, self.statedef.ncomps())?;
        if !conc.is_finite() || conc < 0.0 {
            return Err(SimError::BadQuantity {
                what: "concentration",
                value: conc,
            });
        }
        let requested = (conc * 1.0e3 * AVOGADRO * self.mesh.comp_vol(comp)).round();
        if requested >= u64::MAX as f64 {
            return Err(SimError::CountOverflow { requested });
        }
        self.set_comp_count(comp, spec, requested as u64)
    }

    /// Clamp or release `spec` in every voxel of a compartment.
    pub fn set_comp_clamped(&mut self, comp: CompId, spec: SpecId, clamped: bool) -> Result<(), SimError> {
        let local = self.comp_local_spec(comp, spec)?;
        let voxels: Vec<VoxelId> = self.mesh.comp_voxels(comp).to_vec();
        for vid in voxels {
            self.mesh.voxel_mut(vid).set_clamped(local, clamped);
        }
        Ok(())
    }

    /// Compartment-default nominal rate constant of a reaction.
    pub fn comp_reac_kcst(&self, comp: CompId, reac: ReacId) -> Result<f64, SimError> {
        let pos = self.comp_reac_pos(comp, reac)?;
        Ok(self.statedef.comp(comp).kcst(pos))
    }

    /// Replace a reaction's compartment default and rewrite every voxel
    /// instance derived from it.
    pub fn set_comp_reac_kcst(&mut self, comp: CompId, reac: ReacId, kcst: f64) -> Result<(), SimError> {
        check_rate_const(kcst)?;
        let pos = self.comp_reac_pos(comp, reac)?;
        self.statedef.set_comp_kcst(comp, pos, kcst);
        let voxels: Vec<VoxelId> = self.mesh.comp_voxels(comp).to_vec();
        for vid in voxels {
            for i in 0..self.mesh.voxel(vid).kprocs().len() {
                let kid = self.mesh.voxel(vid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::Reac(r) if r.reac() == reac);
                if hit {
                    self.rewrite_rate_const(kid, kcst);
                }
            }
        }
        Ok(())
    }

    /// Activate or deactivate every voxel instance of a reaction in a
    /// compartment.
    pub fn set_comp_reac_active(&mut self, comp: CompId, reac: ReacId, active: bool) -> Result<(), SimError> {
        self.comp_reac_pos(comp, reac)?;
        let voxels: Vec<VoxelId> = self.mesh.comp_voxels(comp).to_vec();
        for vid in voxels {
            for i in 0..self.mesh.voxel(vid).kprocs().len() {
                let kid = self.mesh.voxel(vid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::Reac(r) if r.reac() == reac);
                if hit {
                    self.rewrite_activity(kid, active);
                }
            }
        }
        Ok(())
    }

    /// Total number of firings of a reaction across a compartment.
    pub fn comp_reac_extent(&self, comp: CompId, reac: ReacId) -> Result<u64, SimError> {
        self.comp_reac_pos(comp, reac)?;
        let mut total = 0;
        for &vid in self.mesh.comp_voxels(comp) {
            for &kid in self.mesh.voxel(vid).kprocs() {
                if let KProc::Reac(r) = &self.kprocs[kid.0 as usize] {
                    if r.reac() == reac {
                        total += r.extent();
                    }
                }
            }
        }
        Ok(total)
    }

    /// Zero the extent counter of every instance of a reaction in a
    /// compartment.
    pub fn reset_comp_reac_extent(&mut self, comp: CompId, reac: ReacId) -> Result<(), SimError> {
        self.comp_reac_pos(comp, reac)?;
        let voxels: Vec<VoxelId> = self.mesh.comp_voxels(comp).to_vec();
        for vid in voxels {
            for i in 0..self.mesh.voxel(vid).kprocs().len() {
                let kid = self.mesh.voxel(vid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::Reac(r) if r.reac() == reac);
                if hit {
                    self.kprocs[kid.0 as usize].reset_extent();
                }
            }
        }
        Ok(())
    }

    /// Compartment-default diffusion constant of a rule.
    pub fn comp_diff_dcst(&self, comp: CompId, diff: DiffId) -> Result<f64, SimError> {
        let pos = self.comp_diff_pos(comp, diff)?;
        Ok(self.statedef.comp(comp).dcst(pos))
    }

    /// Replace a diffusion rule's compartment default and rewrite every
    /// hop derived from it.
    pub fn set_comp_diff_dcst(&mut self, comp: CompId, diff: DiffId, dcst: f64) -> Result<(), SimError> {
        check_rate_const(dcst)?;
        let pos = self.comp_diff_pos(comp, diff)?;
        self.statedef.set_comp_dcst(comp, pos, dcst);
        let voxels: Vec<VoxelId> = self.mesh.comp_voxels(comp).to_vec();
        for vid in voxels {
            for i in 0..self.mesh.voxel(vid).kprocs().len() {
                let kid = self.mesh.voxel(vid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::Diff(h) if h.diff() == diff);
                if hit {
                    self.rewrite_rate_const(kid, dcst);
                }
            }
        }
        Ok(())
    }

    // ── Per-patch aggregates ────────────────────────────────────────────

    /// Total area of a patch, in square meters.
    pub fn patch_area(&self, patch: PatchId) -> Result<f64, SimError> {
        check_index("patch", patch.0, self.statedef.npatches())?;
        Ok(self.mesh.patch_area(patch))
    }

    /// Total molecule count of `spec` across a patch's facets.
    pub fn patch_count(&self, patch: PatchId, spec: SpecId) -> Result<u64, SimError> {
        let local = self.patch_local_spec(patch, spec)?;
        Ok(self
            .mesh
            .patch_facets(patch)
            .iter()
            .map(|&f| u64::from(self.mesh.facet(f).count(local)))
            .sum())
    }

    /// Distribute a total molecule count of `spec` over a patch, by area
    /// share with area-weighted remainder placement.
    pub fn set_patch_count(&mut self, patch: PatchId, spec: SpecId, count: u64) -> Result<(), SimError> {
        let local = self.patch_local_spec(patch, spec)?;
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        let total_area = self.mesh.patch_area(patch);

        let mut counts: Vec<u32> = Vec::with_capacity(facets.len());
        let mut assigned: u64 = 0;
        for &fid in &facets {
            let share = (count as f64 * self.mesh.facet(fid).area() / total_area).floor();
            if share > f64::from(u32::MAX) {
                return Err(SimError::CountOverflow { requested: share });
            }
            counts.push(share as u32);
            assigned += share as u64;
        }
        let remainder = count.saturating_sub(assigned);
        for &base in &counts {
            if u64::from(base) + remainder > u64::from(u32::MAX) {
                return Err(SimError::CountOverflow {
                    requested: (u64::from(base) + remainder) as f64,
                });
            }
        }
        for _ in 0..remainder {
            let target = self.rng.uniform_f64() * total_area;
            let mut acc = 0.0;
            let mut idx = facets.len() - 1;
            for (i, &fid) in facets.iter().enumerate() {
                acc += self.mesh.facet(fid).area();
                if target < acc {
                    idx = i;
                    break;
                }
            }
            counts[idx] += 1;
        }

        for (i, &fid) in facets.iter().enumerate() {
            self.mesh.facet_mut(fid).set_count(local, counts[i]);
        }
        for &fid in &facets {
            self.refresh_facet(fid);
        }
        Ok(())
    }

    /// Clamp or release `spec` on every facet of a patch.
    pub fn set_patch_clamped(&mut self, patch: PatchId, spec: SpecId, clamped: bool) -> Result<(), SimError> {
        let local = self.patch_local_spec(patch, spec)?;
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        for fid in facets {
            self.mesh.facet_mut(fid).set_clamped(local, clamped);
        }
        Ok(())
    }

    /// Patch-default nominal rate constant of a surface reaction.
    pub fn patch_sreac_kcst(&self, patch: PatchId, sreac: SReacId) -> Result<f64, SimError> {
        let pos = self.patch_sreac_pos(patch, sreac)?;
        Ok(self.statedef.patch(patch).kcst(pos))
    }

    /// Replace a surface reaction's patch default and rewrite every facet
    /// instance derived from it.
    pub fn set_patch_sreac_kcst(&mut self, patch: PatchId, sreac: SReacId, kcst: f64) -> Result<(), SimError> {
        check_rate_const(kcst)?;
        let pos = self.patch_sreac_pos(patch, sreac)?;
        self.statedef.set_patch_kcst(patch, pos, kcst);
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        for fid in facets {
            for i in 0..self.mesh.facet(fid).kprocs().len() {
                let kid = self.mesh.facet(fid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::SReac(s) if s.sreac() == sreac);
                if hit {
                    self.rewrite_rate_const(kid, kcst);
                }
            }
        }
        Ok(())
    }

    /// Activate or deactivate every facet instance of a surface reaction
    /// on a patch.
    pub fn set_patch_sreac_active(&mut self, patch: PatchId, sreac: SReacId, active: bool) -> Result<(), SimError> {
        self.patch_sreac_pos(patch, sreac)?;
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        for fid in facets {
            for i in 0..self.mesh.facet(fid).kprocs().len() {
                let kid = self.mesh.facet(fid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::SReac(s) if s.sreac() == sreac);
                if hit {
                    self.rewrite_activity(kid, active);
                }
            }
        }
        Ok(())
    }

    /// Total number of firings of a surface reaction across a patch.
    pub fn patch_sreac_extent(&self, patch: PatchId, sreac: SReacId) -> Result<u64, SimError> {
        self.patch_sreac_pos(patch, sreac)?;
        let mut total = 0;
        for &fid in self.mesh.patch_facets(patch) {
            for &kid in self.mesh.facet(fid).kprocs() {
                if let KProc::SReac(s) = &self.kprocs[kid.0 as usize] {
                    if s.sreac() == sreac {
                        total += s.extent();
                    }
                }
            }
        }
        Ok(total)
    }

    /// Zero the extent counter of every instance of a surface reaction on
    /// a patch.
    pub fn reset_patch_sreac_extent(&mut self, patch: PatchId, sreac: SReacId) -> Result<(), SimError> {
        self.patch_sreac_pos(patch, sreac)?;
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        for fid in facets {
            for i in 0..self.mesh.facet(fid).kprocs().len() {
                let kid = self.mesh.facet(fid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::SReac(s) if s.sreac() == sreac);
                if hit {
                    self.kprocs[kid.0 as usize].reset_extent();
                }
            }
        }
        Ok(())
    }

    /// Set the membrane potential across every facet of a patch.
    pub fn set_patch_potential(&mut self, patch: PatchId, potential: f64) -> Result<(), SimError> {
        check_index("patch", patch.0, self.statedef.npatches())?;
        self.check_potential(patch, potential)?;
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        for &fid in &facets {
            self.mesh.facet_mut(fid).set_potential(potential);
        }
        for &fid in &facets {
            self.refresh_facet(fid);
        }
        Ok(())
    }

    /// Patch-default surface diffusion constant of a rule.
    pub fn patch_sdiff_dcst(&self, patch: PatchId, sdiff: SDiffId) -> Result<f64, SimError> {
        let pos = self.patch_sdiff_pos(patch, sdiff)?;
        Ok(self.statedef.patch(patch).dcst(pos))
    }

    /// Replace a surface diffusion rule's patch default and rewrite every
    /// hop derived from it.
    pub fn set_patch_sdiff_dcst(&mut self, patch: PatchId, sdiff: SDiffId, dcst: f64) -> Result<(), SimError> {
        check_rate_const(dcst)?;
        let pos = self.patch_sdiff_pos(patch, sdiff)?;
        self.statedef.set_patch_dcst(patch, pos, dcst);
        let facets: Vec<FacetId> = self.mesh.patch_facets(patch).to_vec();
        for fid in facets {
            for i in 0..self.mesh.facet(fid).kprocs().len() {
                let kid = self.mesh.facet(fid).kprocs()[i];
                let hit = matches!(&self.kprocs[kid.0 as usize],
                    KProc::SDiff(h) if h.sdiff() == sdiff);
                if hit {
                    self.rewrite_rate_const(kid, dcst);
                }
            }
        }
        Ok(())
    }

    // ── Checkpointing ───────────────────────────────────────────────────

    /// Serialize the full solver state.
    pub fn checkpoint(&self, w: &mut dyn Write) -> Result<(), SimError> {
        self.snapshot().encode(w)?;
        Ok(())
    }

    /// Replace the full solver state with a serialized one.
    ///
    /// All or nothing: the snapshot is decoded and validated against this
    /// solver's model and mesh, and applied to staged copies of the live
    /// state; only a fully consistent image is committed. On any error the
    /// solver is exactly as it was.
    pub fn restore(&mut self, r: &mut dyn Read) -> Result<(), SimError> {
        let snap = Snapshot::decode(r)?;
        self.apply_snapshot(&snap)
    }

    /// [`checkpoint`](Self::checkpoint) into a file, synced to disk before
    /// returning.
    pub fn checkpoint_to_path(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let file = File::create(path.as_ref()).map_err(CheckpointError::from)?;
        let mut w = BufWriter::new(file);
        self.snapshot().encode(&mut w)?;
        let file = w
            .into_inner()
            .map_err(|e| CheckpointError::from(e.into_error()))?;
        file.sync_all().map_err(CheckpointError::from)?;
        Ok(())
    }

    /// [`restore`](Self::restore) from a file.
    pub fn restore_from_path(&mut self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let file = File::open(path.as_ref()).map_err(CheckpointError::from)?;
        let mut r = BufReader::new(file);
        self.restore(&mut r)
    }

    /// Run to `end_time`, writing a checkpoint at every elapsed multiple
    /// of `interval`. Files are named `{prefix}{steps}.tck` after the
    /// event count at the moment of the write.
    pub fn run_with_checkpoints(
        &mut self,
        end_time: f64,
        interval: f64,
        prefix: &str,
    ) -> Result<(), SimError> {
        if !end_time.is_finite() {
            return Err(SimError::BadQuantity {
                what: "end time",
                value: end_time,
            });
        }
        if end_time < self.time {
            return Err(SimError::EndTimeBeforeCurrent {
                end: end_time,
                now: self.time,
            });
        }
        if !interval.is_finite() || interval <= 0.0 {
            return Err(SimError::BadQuantity {
                what: "checkpoint interval",
                value: interval,
            });
        }
        let start = self.time;
        // Boundaries are multiples of the interval from the starting time,
        // not accumulated additions, so drift does not compound.
        let mut k: u64 = 1;
        loop {
            let boundary = start + interval * k as f64;
            if boundary > end_time {
                break;
            }
            self.run(boundary)?;
            self.checkpoint_to_path(format!("{prefix}{}.tck", self.nsteps))?;
            k += 1;
        }
        self.run(end_time)
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// Occupancy summary of the selection structure.
    pub fn diagnostics(&self) -> SchedulerDiagnostics {
        self.sched.diagnostics()
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn fire(&mut self, kid: KProcId) {
        self.kprocs[kid.0 as usize].apply(&mut self.mesh);
        for &dep in &self.deps[kid.0 as usize] {
            let rate = self.kprocs[dep.0 as usize].rate(&self.statedef, &self.mesh);
            self.sched.set_rate(dep, rate);
        }
    }

    fn full_refresh(&mut self) {
        for k in &self.kprocs {
            let rate = k.rate(&self.statedef, &self.mesh);
            self.sched.set_rate(k.id(), rate);
        }
    }

    /// Recompute the rate of every process that reads this voxel's pools:
    /// the voxel's own, plus those on its bordering facets.
    fn refresh_voxel(&mut self, voxel: VoxelId) {
        for &kid in self.mesh.voxel(voxel).kprocs() {
            let rate = self.kprocs[kid.0 as usize].rate(&self.statedef, &self.mesh);
            self.sched.set_rate(kid, rate);
        }
        for i in 0..self.mesh.voxel_facets(voxel).len() {
            let fid = self.mesh.voxel_facets(voxel)[i];
            self.refresh_facet(fid);
        }
    }

    fn refresh_facet(&mut self, facet: FacetId) {
        for &kid in self.mesh.facet(facet).kprocs() {
            let rate = self.kprocs[kid.0 as usize].rate(&self.statedef, &self.mesh);
            self.sched.set_rate(kid, rate);
        }
    }

    fn rewrite_rate_const(&mut self, kid: KProcId, value: f64) {
        self.kprocs[kid.0 as usize].set_rate_const(value);
        let rate = self.kprocs[kid.0 as usize].rate(&self.statedef, &self.mesh);
        self.sched.set_rate(kid, rate);
    }

    fn rewrite_activity(&mut self, kid: KProcId, active: bool) {
        self.kprocs[kid.0 as usize].set_activity(Activity::from(active));
        let rate = self.kprocs[kid.0 as usize].rate(&self.statedef, &self.mesh);
        self.sched.set_rate(kid, rate);
    }

    fn voxel_local_spec(&self, voxel: VoxelId, spec: SpecId) -> Result<LocalSpecId, SimError> {
        check_index("voxel", voxel.0, self.mesh.nvoxels())?;
        self.comp_local_spec(self.mesh.voxel(voxel).comp(), spec)
    }

    fn facet_local_spec(&self, facet: FacetId, spec: SpecId) -> Result<LocalSpecId, SimError> {
        check_index("facet", facet.0, self.mesh.nfacets())?;
        self.patch_local_spec(self.mesh.facet(facet).patch(), spec)
    }

    fn comp_local_spec(&self, comp: CompId, spec: SpecId) -> Result<LocalSpecId, SimError> {
        check_index("compartment", comp.0, self.statedef.ncomps())?;
        check_index("species", spec.0, self.statedef.nspecs())?;
        let compdef = self.statedef.comp(comp);
        compdef.g2l(spec).ok_or_else(|| SimError::NotSupported {
            what: format!(
                "species '{}' in compartment '{}'",
                self.statedef.spec(spec).name(),
                compdef.name()
            ),
        })
    }

    fn patch_local_spec(&self, patch: PatchId, spec: SpecId) -> Result<LocalSpecId, SimError> {
        check_index("patch", patch.0, self.statedef.npatches())?;
        check_index("species", spec.0, self.statedef.nspecs())?;
        let patchdef = self.statedef.patch(patch);
        patchdef.g2l(spec).ok_or_else(|| SimError::NotSupported {
            what: format!(
                "species '{}' on patch '{}'",
                self.statedef.spec(spec).name(),
                patchdef.name()
            ),
        })
    }

    fn voxel_reac(&self, voxel: VoxelId, reac: ReacId) -> Result<KProcId, SimError> {
        check_index("voxel", voxel.0, self.mesh.nvoxels())?;
        check_index("reaction", reac.0, self.statedef.reacs().len() as u32)?;
        self.mesh
            .voxel(voxel)
            .kprocs()
            .iter()
            .copied()
            .find(|&kid| matches!(&self.kprocs[kid.0 as usize], KProc::Reac(r) if r.reac() == reac))
            .ok_or_else(|| SimError::NotSupported {
                what: format!(
                    "reaction '{}' in compartment '{}'",
                    self.statedef.reac(reac).name(),
                    self.statedef.comp(self.mesh.voxel(voxel).comp()).name()
                ),
            })
    }

    fn voxel_diff_hops(&self, voxel: VoxelId, diff: DiffId) -> Result<Vec<KProcId>, SimError> {
        check_index("voxel", voxel.0, self.mesh.nvoxels())?;
        check_index("diffusion rule", diff.0, self.statedef.diffs().len() as u32)?;
        let hops: Vec<KProcId> = self
            .mesh
            .voxel(voxel)
            .kprocs()
            .iter()
            .copied()
            .filter(|&kid| matches!(&self.kprocs[kid.0 as usize], KProc::Diff(h) if h.diff() == diff))
            .collect();
        if hops.is_empty() {
            return Err(SimError::NotSupported {
                what: format!(
                    "diffusion of '{}' out of voxel {}",
                    self.statedef.diff(diff).name(),
                    voxel.0
                ),
            });
        }
        Ok(hops)
    }

    fn facet_sreac(&self, facet: FacetId, sreac: SReacId) -> Result<KProcId, SimError> {
        check_index("facet", facet.0, self.mesh.nfacets())?;
        check_index("surface reaction", sreac.0, self.statedef.sreacs().len() as u32)?;
        self.mesh
            .facet(facet)
            .kprocs()
            .iter()
            .copied()
            .find(|&kid| matches!(&self.kprocs[kid.0 as usize], KProc::SReac(s) if s.sreac() == sreac))
            .ok_or_else(|| SimError::NotSupported {
                what: format!(
                    "surface reaction '{}' on patch '{}'",
                    self.statedef.sreac(sreac).name(),
                    self.statedef.patch(self.mesh.facet(facet).patch()).name()
                ),
            })
    }

    fn comp_reac_pos(&self, comp: CompId, reac: ReacId) -> Result<usize, SimError> {
        check_index("compartment", comp.0, self.statedef.ncomps())?;
        check_index("reaction", reac.0, self.statedef.reacs().len() as u32)?;
        self.statedef
            .comp(comp)
            .reac_pos(reac)
            .ok_or_else(|| SimError::NotSupported {
                what: format!(
                    "reaction '{}' in compartment '{}'",
                    self.statedef.reac(reac).name(),
                    self.statedef.comp(comp).name()
                ),
            })
    }

    fn comp_diff_pos(&self, comp: CompId, diff: DiffId) -> Result<usize, SimError> {
        check_index("compartment", comp.0, self.statedef.ncomps())?;
        check_index("diffusion rule", diff.0, self.statedef.diffs().len() as u32)?;
        self.statedef
            .comp(comp)
            .diff_pos(diff)
            .ok_or_else(|| SimError::NotSupported {
                what: format!(
                    "diffusion rule '{}' in compartment '{}'",
                    self.statedef.diff(diff).name(),
                    self.statedef.comp(comp).name()
                ),
            })
    }

    fn patch_sreac_pos(&self, patch: PatchId, sreac: SReacId) -> Result<usize, SimError> {
        check_index("patch", patch.0, self.statedef.npatches())?;
        check_index("surface reaction", sreac.0, self.statedef.sreacs().len() as u32)?;
        self.statedef
            .patch(patch)
            .sreac_pos(sreac)
            .ok_or_else(|| SimError::NotSupported {
                what: format!(
                    "surface reaction '{}' on patch '{}'",
                    self.statedef.sreac(sreac).name(),
                    self.statedef.patch(patch).name()
                ),
            })
    }

    fn patch_sdiff_pos(&self, patch: PatchId, sdiff: SDiffId) -> Result<usize, SimError> {
        check_index("patch", patch.0, self.statedef.npatches())?;
        check_index(
            "surface diffusion rule",
            sdiff.0,
            self.statedef.sdiffs().len() as u32,
        )?;
        self.statedef
            .patch(patch)
            .sdiff_pos(sdiff)
            .ok_or_else(|| SimError::NotSupported {
                what: format!(
                    "surface diffusion rule '{}' on patch '{}'",
                    self.statedef.sdiff(sdiff).name(),
                    self.statedef.patch(patch).name()
                ),
            })
    }

    fn check_potential(&self, patch: PatchId, potential: f64) -> Result<(), SimError> {
        if !potential.is_finite() {
            return Err(SimError::BadQuantity {
                what: "potential",
                value: potential,
            });
        }
        for &tid in self.statedef.patch(patch).vdep_trans() {
            let def = self.statedef.vdep_trans(tid);
            if !def.in_range(potential) {
                return Err(SimError::PotentialOutOfRange {
                    potential,
                    transition: def.name().to_owned(),
                });
            }
        }
        Ok(())
    }

    fn default_rate_const(&self, k: &KProc) -> Option<f64> {
        match k {
            KProc::Reac(r) => {
                let compdef = self.statedef.comp(self.mesh.voxel(r.voxel()).comp());
                compdef.reac_pos(r.reac()).map(|pos| compdef.kcst(pos))
            }
            KProc::Diff(h) => {
                let compdef = self.statedef.comp(self.mesh.voxel(h.src()).comp());
                compdef.diff_pos(h.diff()).map(|pos| compdef.dcst(pos))
            }
            KProc::SReac(s) => {
                let patchdef = self.statedef.patch(self.mesh.facet(s.facet()).patch());
                patchdef.sreac_pos(s.sreac()).map(|pos| patchdef.kcst(pos))
            }
            KProc::SDiff(h) => {
                let patchdef = self.statedef.patch(self.mesh.facet(h.src()).patch());
                patchdef.sdiff_pos(h.sdiff()).map(|pos| patchdef.dcst(pos))
            }
            KProc::VDepTrans(_) => None,
        }
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            nspecs: self.statedef.nspecs(),
            nreacs: self.statedef.reacs().len() as u32,
            nsreacs: self.statedef.sreacs().len() as u32,
            ndiffs: self.statedef.diffs().len() as u32,
            nsdiffs: self.statedef.sdiffs().len() as u32,
            nvdep_trans: self.statedef.vdep_trans_all().len() as u32,
            ncomps: self.statedef.ncomps(),
            npatches: self.statedef.npatches(),
            nvoxels: self.mesh.nvoxels(),
            nfacets: self.mesh.nfacets(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        let record = |kid: &KProcId| {
            let k = &self.kprocs[kid.0 as usize];
            KProcRecord {
                rate_const: k.rate_const(),
                ccst: k.ccst(),
                extent: k.extent(),
                active: k.activity().is_active(),
            }
        };
        let comps = self
            .statedef
            .comps()
            .iter()
            .map(|c| RateTable {
                kcsts: (0..c.reacs().len()).map(|pos| c.kcst(pos)).collect(),
                dcsts: (0..c.diffs().len()).map(|pos| c.dcst(pos)).collect(),
            })
            .collect();
        let patches = self
            .statedef
            .patches()
            .iter()
            .map(|p| RateTable {
                kcsts: (0..p.sreacs().len()).map(|pos| p.kcst(pos)).collect(),
                dcsts: (0..p.sdiffs().len()).map(|pos| p.dcst(pos)).collect(),
            })
            .collect();
        let facets = self
            .mesh
            .facets()
            .iter()
            .map(|f| FacetState {
                potential: f.potential(),
                pools: f.pools().to_vec(),
                clamped: f.clamp_flags().to_vec(),
                kprocs: f.kprocs().iter().map(record).collect(),
            })
            .collect();
        let voxels = self
            .mesh
            .voxels()
            .iter()
            .map(|v| VoxelState {
                pools: v.pools().to_vec(),
                clamped: v.clamp_flags().to_vec(),
                kprocs: v.kprocs().iter().map(record).collect(),
            })
            .collect();
        Snapshot {
            fingerprint: self.fingerprint(),
            comps,
            patches,
            facets,
            voxels,
            scheduler: self.sched.export(),
            rng: self.rng.state(),
            time: self.time,
            nsteps: self.nsteps,
        }
    }

    fn validate_snapshot(&self, snap: &Snapshot) -> Result<(), CheckpointError> {
        let current = self.fingerprint();
        let fp = &snap.fingerprint;
        let counts = [
            ("species count", fp.nspecs, current.nspecs),
            ("reaction count", fp.nreacs, current.nreacs),
            ("surface reaction count", fp.nsreacs, current.nsreacs),
            ("diffusion rule count", fp.ndiffs, current.ndiffs),
            ("surface diffusion rule count", fp.nsdiffs, current.nsdiffs),
            ("voltage transition count", fp.nvdep_trans, current.nvdep_trans),
            ("compartment count", fp.ncomps, current.ncomps),
            ("patch count", fp.npatches, current.npatches),
            ("voxel count", fp.nvoxels, current.nvoxels),
            ("facet count", fp.nfacets, current.nfacets),
        ];
        for (what, stored, live) in counts {
            if stored != live {
                return Err(CheckpointError::ModelMismatch {
                    what: what.to_owned(),
                    stored: u64::from(stored),
                    current: u64::from(live),
                });
            }
        }

        for (i, table) in snap.comps.iter().enumerate() {
            let compdef = self.statedef.comp(CompId(i as u32));
            if table.kcsts.len() != compdef.reacs().len()
                || table.dcsts.len() != compdef.diffs().len()
            {
                return Err(CheckpointError::Corrupt {
                    detail: format!("rate table shape of compartment '{}'", compdef.name()),
                });
            }
        }
        for (i, table) in snap.patches.iter().enumerate() {
            let patchdef = self.statedef.patch(PatchId(i as u32));
            if table.kcsts.len() != patchdef.sreacs().len()
                || table.dcsts.len() != patchdef.sdiffs().len()
            {
                return Err(CheckpointError::Corrupt {
                    detail: format!("rate table shape of patch '{}'", patchdef.name()),
                });
            }
        }
        let tables = snap
            .comps
            .iter()
            .chain(snap.patches.iter())
            .flat_map(|t| t.kcsts.iter().chain(t.dcsts.iter()));
        for &value in tables {
            if !value.is_finite() || value < 0.0 {
                return Err(CheckpointError::Corrupt {
                    detail: format!("stored rate constant {value}"),
                });
            }
        }

        for (i, fs) in snap.facets.iter().enumerate() {
            let fid = FacetId(i as u32);
            let facet = self.mesh.facet(fid);
            let nspecs = self.statedef.patch(facet.patch()).nspecs() as usize;
            if fs.pools.len() != nspecs || fs.clamped.len() != nspecs {
                return Err(CheckpointError::Corrupt {
                    detail: format!("pool vector shape of facet {i}"),
                });
            }
            if fs.kprocs.len() != facet.kprocs().len() {
                return Err(CheckpointError::Corrupt {
                    detail: format!("process record count of facet {i}"),
                });
            }
            self.check_potential(facet.patch(), fs.potential)
                .map_err(|_| CheckpointError::Corrupt {
                    detail: format!("stored potential {} of facet {i}", fs.potential),
                })?;
            check_records(&fs.kprocs)?;
        }
        for (i, vs) in snap.voxels.iter().enumerate() {
            let vid = VoxelId(i as u32);
            let voxel = self.mesh.voxel(vid);
            let nspecs = self.statedef.comp(voxel.comp()).nspecs() as usize;
            if vs.pools.len() != nspecs || vs.clamped.len() != nspecs {
                return Err(CheckpointError::Corrupt {
                    detail: format!("pool vector shape of voxel {i}"),
                });
            }
            if vs.kprocs.len() != voxel.kprocs().len() {
                return Err(CheckpointError::Corrupt {
                    detail: format!("process record count of voxel {i}"),
                });
            }
            check_records(&vs.kprocs)?;
        }
        Ok(())
    }

    fn apply_snapshot(&mut self, snap: &Snapshot) -> Result<(), SimError> {
        self.validate_snapshot(snap)?;

        // Stage everything on copies; commit only once the scheduler
        // image has validated against the recomputed rates.
        let mut statedef = self.statedef.clone();
        let mut mesh = self.mesh.clone();
        let mut kprocs = self.kprocs.clone();

        for (i, table) in snap.comps.iter().enumerate() {
            for (pos, &kcst) in table.kcsts.iter().enumerate() {
                statedef.set_comp_kcst(CompId(i as u32), pos, kcst);
            }
            for (pos, &dcst) in table.dcsts.iter().enumerate() {
                statedef.set_comp_dcst(CompId(i as u32), pos, dcst);
            }
        }
        for (i, table) in snap.patches.iter().enumerate() {
            for (pos, &kcst) in table.kcsts.iter().enumerate() {
                statedef.set_patch_kcst(PatchId(i as u32), pos, kcst);
            }
            for (pos, &dcst) in table.dcsts.iter().enumerate() {
                statedef.set_patch_dcst(PatchId(i as u32), pos, dcst);
            }
        }

        for (i, fs) in snap.facets.iter().enumerate() {
            let fid = FacetId(i as u32);
            let ids: Vec<KProcId> = mesh.facet(fid).kprocs().to_vec();
            let facet = mesh.facet_mut(fid);
            facet.set_potential(fs.potential);
            for (s, (&n, &c)) in fs.pools.iter().zip(fs.clamped.iter()).enumerate() {
                facet.set_count(LocalSpecId(s as u32), n);
                facet.set_clamped(LocalSpecId(s as u32), c);
            }
            restore_records(&mut kprocs, &ids, &fs.kprocs, i, "facet")?;
        }
        for (i, vs) in snap.voxels.iter().enumerate() {
            let vid = VoxelId(i as u32);
            let ids: Vec<KProcId> = mesh.voxel(vid).kprocs().to_vec();
            let voxel = mesh.voxel_mut(vid);
            for (s, (&n, &c)) in vs.pools.iter().zip(vs.clamped.iter()).enumerate() {
                voxel.set_count(LocalSpecId(s as u32), n);
                voxel.set_clamped(LocalSpecId(s as u32), c);
            }
            restore_records(&mut kprocs, &ids, &vs.kprocs, i, "voxel")?;
        }

        let rates: Vec<f64> = kprocs.iter().map(|k| k.rate(&statedef, &mesh)).collect();
        let mut sched = Scheduler::new(kprocs.len());
        sched.import(&snap.scheduler, &rates)?;

        self.statedef = statedef;
        self.mesh = mesh;
        self.kprocs = kprocs;
        self.sched = sched;
        self.rng = SimRng::from_state(&snap.rng);
        self.time = snap.time;
        self.nsteps = snap.nsteps;
        Ok(())
    }
}

fn check_records(records: &[KProcRecord]) -> Result<(), CheckpointError> {
    for r in records {
        if !r.rate_const.is_finite() || r.rate_const < 0.0 || !r.ccst.is_finite() || r.ccst < 0.0 {
            return Err(CheckpointError::Corrupt {
                detail: format!(
                    "stored process constants ({}, {})",
                    r.rate_const, r.ccst
                ),
            });
        }
    }
    Ok(())
}

/// Write serialized per-process records onto staged kinetic processes.
///
/// The stored ccst doubles as a cross-check: the staged process rescales
/// from the stored nominal constant and its own frozen geometry, and the
/// result must reproduce the stored ccst bit for bit. A mismatch means the
/// snapshot came from a solver with the same element counts but different
/// geometry or anchoring.
fn restore_records(
    kprocs: &mut [KProc],
    ids: &[KProcId],
    records: &[KProcRecord],
    element: usize,
    element_kind: &str,
) -> Result<(), CheckpointError> {
    for (&kid, rec) in ids.iter().zip(records.iter()) {
        let k = &mut kprocs[kid.0 as usize];
        k.set_rate_const(rec.rate_const);
        if k.ccst() != rec.ccst {
            return Err(CheckpointError::Corrupt {
                detail: format!(
                    "scaled constant of process {} on {element_kind} {element}: \
                     stored {}, recomputed {}",
                    kid.0,
                    rec.ccst,
                    k.ccst()
                ),
            });
        }
        k.load_counters(rec.extent, Activity::from(rec.active));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_mesh::{FacetDecl, MeshSpec, VoxelDecl};
    use tessera_model::{CompDecl, DiffDecl, ModelSpec, PatchDecl, ReacDecl, VDepTransDecl};

    // Birth-death in a three-voxel line with diffusion of A:
    // birth: (nothing) -> A at BIRTH_KCST, death: A -> (nothing) per
    // molecule.
    const BIRTH_KCST: f64 = 50.0;
    const DEATH_KCST: f64 = 2.0;
    const VOXEL_VOL: f64 = 1.0e-18;

    fn line_solver(seed: u64) -> Solver {
        let mut m = ModelSpec::new();
        let a = m.add_species("A");
        let birth = m.add_reac(ReacDecl {
            name: "birth".into(),
            lhs: vec![],
            rhs: vec![(a, 1)],
            kcst: BIRTH_KCST,
        });
        let death = m.add_reac(ReacDecl {
            name: "death".into(),
            lhs: vec![(a, 1)],
            rhs: vec![],
            kcst: DEATH_KCST,
        });
        let da = m.add_diff(DiffDecl {
            name: "dA".into(),
            lig: a,
            dcst: 1.0e-12,
        });
        m.add_comp(CompDecl {
            name: "cyt".into(),
            reacs: vec![birth, death],
            diffs: vec![da],
            species: vec![],
        });
        let sd = Statedef::build(&m).unwrap();

        let mut ms = MeshSpec::new();
        for i in 0..3u32 {
            let mut decl = VoxelDecl::new(CompId(0), VOXEL_VOL);
            if i > 0 {
                decl = decl.link(0, VoxelId(i - 1), 1.0e-6, 1.0e-13);
            }
            if i < 2 {
                decl = decl.link(1, VoxelId(i + 1), 1.0e-6, 1.0e-13);
            }
            ms.add_voxel(decl);
        }
        let mesh = Mesh::build(&sd, &ms).unwrap();
        Solver::new(sd, mesh, seed)
    }

    // One voxel, one facet, a two-state channel gated by voltage.
    fn channel_solver(seed: u64) -> Solver {
        let mut m = ModelSpec::new();
        let closed = m.add_species("C");
        let open = m.add_species("O");
        let gate = m.add_vdep_trans(VDepTransDecl {
            name: "gate".into(),
            src: closed,
            dst: open,
            vmin: -0.1,
            vmax: 0.1,
            dv: 0.05,
            table: vec![1.0, 2.0, 4.0, 8.0, 16.0],
        });
        m.add_comp(CompDecl {
            name: "cyt".into(),
            ..Default::default()
        });
        m.add_patch(PatchDecl {
            name: "memb".into(),
            icomp: CompId(0),
            ocomp: None,
            sreacs: vec![],
            sdiffs: vec![],
            vdeptrans: vec![gate],
            species: vec![],
            init_potential: -0.06,
        });
        let sd = Statedef::build(&m).unwrap();
        let mut ms = MeshSpec::new();
        let v = ms.add_voxel(VoxelDecl::new(CompId(0), VOXEL_VOL));
        ms.add_facet(FacetDecl::new(PatchId(0), 1.0e-13, v));
        let mesh = Mesh::build(&sd, &ms).unwrap();
        Solver::new(sd, mesh, seed)
    }

    #[test]
    fn construction_anchors_processes_per_element() {
        let s = line_solver(1);
        // End voxels host birth, death and one out-hop; the middle one
        // hosts two out-hops.
        assert_eq!(s.mesh().voxel(VoxelId(0)).kprocs().len(), 3);
        assert_eq!(s.mesh().voxel(VoxelId(1)).kprocs().len(), 4);
        assert_eq!(s.mesh().voxel(VoxelId(2)).kprocs().len(), 3);
        // Zero-order births are schedulable from the start.
        let d = s.diagnostics();
        assert_eq!(d.scheduled, 3);
        assert!((d.total_rate - 3.0 * BIRTH_KCST).abs() < 1e-9);
    }

    #[test]
    fn population_writes_reschedule_dependents() {
        let mut s = line_solver(2);
        let a = s.statedef().spec_by_name("A").unwrap();
        let before = s.diagnostics().total_rate;
        s.set_voxel_count(VoxelId(1), a, 10).unwrap();
        let after = s.diagnostics().total_rate;
        // Ten molecules add death and two hop propensities.
        assert!(after > before);
        assert_eq!(s.voxel_count(VoxelId(1), a).unwrap(), 10);
        assert_eq!(s.comp_count(CompId(0), a).unwrap(), 10);
    }

    #[test]
    fn argument_validation_precedes_mutation() {
        let mut s = line_solver(3);
        let a = s.statedef().spec_by_name("A").unwrap();
        assert!(matches!(
            s.set_voxel_count(VoxelId(9), a, 1),
            Err(SimError::IndexOutOfRange { kind: "voxel", index: 9, limit: 3 })
        ));
        assert!(matches!(
            s.voxel_count(VoxelId(0), SpecId(5)),
            Err(SimError::IndexOutOfRange { kind: "species", .. })
        ));
        assert!(matches!(
            s.set_voxel_reac_kcst(VoxelId(0), ReacId(0), f64::NAN),
            Err(SimError::BadRateConstant { .. })
        ));
        assert!(matches!(
            s.run(-1.0),
            Err(SimError::EndTimeBeforeCurrent { .. })
        ));
        assert!(matches!(
            s.advance(-0.5),
            Err(SimError::NegativeWindow { .. })
        ));
    }

    #[test]
    fn compartment_distribution_conserves_the_total() {
        let mut s = line_solver(4);
        let a = s.statedef().spec_by_name("A").unwrap();
        s.set_comp_count(CompId(0), a, 1001).unwrap();
        assert_eq!(s.comp_count(CompId(0), a).unwrap(), 1001);
        // Equal volumes: every voxel holds at least the floor share.
        for v in 0..3 {
            assert!(s.voxel_count(VoxelId(v), a).unwrap() >= 333);
        }
    }

    #[test]
    fn events_advance_clock_and_extents() {
        let mut s = line_solver(5);
        assert!(s.step());
        assert_eq!(s.steps(), 1);
        assert!(s.time() > 0.0);
        s.run(0.05).unwrap();
        assert_eq!(s.time(), 0.05);
        // Empty pools left only births schedulable at the first event, so
        // at least one birth fired; hops and deaths account for the rest.
        let births = s.comp_reac_extent(CompId(0), ReacId(0)).unwrap();
        let deaths = s.comp_reac_extent(CompId(0), ReacId(1)).unwrap();
        assert!(births >= 1);
        assert!(births + deaths <= s.steps());
    }

    #[test]
    fn idle_solver_jumps_to_end_time() {
        let mut s = channel_solver(6);
        // No channels anywhere: nothing can ever fire.
        assert!(!s.step());
        s.run(3.0).unwrap();
        assert_eq!(s.time(), 3.0);
        assert_eq!(s.steps(), 0);
    }

    #[test]
    fn potential_writes_validate_against_attached_tables() {
        let mut s = channel_solver(7);
        let c = s.statedef().spec_by_name("C").unwrap();
        s.set_facet_count(FacetId(0), c, 5).unwrap();
        s.set_facet_potential(FacetId(0), 0.0).unwrap();
        assert_eq!(s.facet_potential(FacetId(0)).unwrap(), 0.0);
        // Table covers [-0.1, 0.1]; 0.2 must be rejected untouched.
        assert!(matches!(
            s.set_facet_potential(FacetId(0), 0.2),
            Err(SimError::PotentialOutOfRange { .. })
        ));
        assert_eq!(s.facet_potential(FacetId(0)).unwrap(), 0.0);
        // At 0.0 V the per-channel rate is the middle table entry.
        assert!((s.diagnostics().total_rate - 5.0 * 4.0).abs() < 1e-12);
    }

    #[test]
    fn deactivation_zeroes_rates_and_reactivation_restores_them() {
        let mut s = line_solver(8);
        s.set_comp_reac_active(CompId(0), ReacId(0), false).unwrap();
        assert_eq!(s.diagnostics().total_rate, 0.0);
        assert!(!s.voxel_reac_active(VoxelId(0), ReacId(0)).unwrap());
        s.set_comp_reac_active(CompId(0), ReacId(0), true).unwrap();
        assert!((s.diagnostics().total_rate - 3.0 * BIRTH_KCST).abs() < 1e-9);
    }

    #[test]
    fn rate_edits_rewrite_instances_and_defaults() {
        let mut s = line_solver(9);
        s.set_comp_reac_kcst(CompId(0), ReacId(0), 80.0).unwrap();
        assert_eq!(s.comp_reac_kcst(CompId(0), ReacId(0)).unwrap(), 80.0);
        assert_eq!(s.voxel_reac_kcst(VoxelId(2), ReacId(0)).unwrap(), 80.0);
        assert!((s.diagnostics().total_rate - 3.0 * 80.0).abs() < 1e-9);
        // A per-voxel override leaves the default alone.
        s.set_voxel_reac_kcst(VoxelId(0), ReacId(0), 10.0).unwrap();
        assert_eq!(s.comp_reac_kcst(CompId(0), ReacId(0)).unwrap(), 80.0);
        assert!((s.diagnostics().total_rate - (10.0 + 160.0)).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_the_just_built_state() {
        let mut s = line_solver(10);
        let a = s.statedef().spec_by_name("A").unwrap();
        s.set_comp_reac_kcst(CompId(0), ReacId(0), 9.0).unwrap();
        s.set_voxel_clamped(VoxelId(0), a, true).unwrap();
        s.run(0.1).unwrap();
        s.reset();
        assert_eq!(s.time(), 0.0);
        assert_eq!(s.steps(), 0);
        assert_eq!(s.comp_count(CompId(0), a).unwrap(), 0);
        assert!(!s.voxel_clamped(VoxelId(0), a).unwrap());
        assert_eq!(s.comp_reac_kcst(CompId(0), ReacId(0)).unwrap(), BIRTH_KCST);
        assert!((s.diagnostics().total_rate - 3.0 * BIRTH_KCST).abs() < 1e-9);
    }

    #[test]
    fn checkpoint_restore_resumes_bit_identically() {
        let mut s = line_solver(11);
        s.run(0.02).unwrap();
        let mut image = Vec::new();
        s.checkpoint(&mut image).unwrap();

        // Continue past the checkpoint, then rewind.
        s.run(0.04).unwrap();
        let diverged = s.steps();
        s.restore(&mut image.as_slice()).unwrap();

        let mut again = Vec::new();
        s.checkpoint(&mut again).unwrap();
        assert_eq!(image, again);

        // The rewound solver replays the same trajectory.
        s.run(0.04).unwrap();
        assert_eq!(s.steps(), diverged);
    }

    #[test]
    fn restore_rejects_a_foreign_model() {
        let mut donor = channel_solver(12);
        donor.run(0.01).unwrap();
        let mut image = Vec::new();
        donor.checkpoint(&mut image).unwrap();

        let mut s = line_solver(13);
        let before = s.diagnostics();
        assert!(matches!(
            s.restore(&mut image.as_slice()),
            Err(SimError::Checkpoint(CheckpointError::ModelMismatch { .. }))
        ));
        // The failed restore left the solver untouched.
        assert_eq!(s.diagnostics(), before);
    }

    #[test]
    fn clamped_pools_hold_still_under_events() {
        let mut s = line_solver(14);
        let a = s.statedef().spec_by_name("A").unwrap();
        s.set_voxel_count(VoxelId(0), a, 100).unwrap();
        s.set_voxel_clamped(VoxelId(0), a, true).unwrap();
        s.set_comp_reac_active(CompId(0), ReacId(0), false).unwrap();
        s.set_voxel_diff_dcst(VoxelId(0), DiffId(0), 0.0).unwrap();
        s.set_voxel_diff_dcst(VoxelId(1), DiffId(0), 0.0).unwrap();
        s.set_voxel_diff_dcst(VoxelId(2), DiffId(0), 0.0).unwrap();
        // Only death can fire, and only in voxel 0, whose pool is pinned.
        s.run(0.5).unwrap();
        assert_eq!(s.voxel_count(VoxelId(0), a).unwrap(), 100);
        assert!(s.steps() > 0);
    }
}
