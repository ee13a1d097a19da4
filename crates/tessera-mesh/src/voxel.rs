//! Voxel state: molecule pools, clamp flags, and frozen adjacency.

use smallvec::SmallVec;
use tessera_core::{CompId, KProcId, LocalSpecId, VoxelId};

/// A single tetrahedral voxel at simulation time.
///
/// Pools are indexed by the owning compartment's local species space.
/// Counts never go negative: transitions are only scheduled while enough
/// reactants are present, so a negative would mean the scheduler fired a
/// process its own rate said was impossible.
#[derive(Clone, Debug)]
pub struct Voxel {
    comp: CompId,
    volume: f64,
    pools: Box<[u32]>,
    clamped: Box<[bool]>,
    neighbors: [Option<VoxelId>; 4],
    distances: [f64; 4],
    areas: [f64; 4],
    kprocs: SmallVec<[KProcId; 8]>,
}

impl Voxel {
    pub(crate) fn new(
        comp: CompId,
        volume: f64,
        nspecs: u32,
        neighbors: [Option<VoxelId>; 4],
        distances: [f64; 4],
        areas: [f64; 4],
    ) -> Self {
        Self {
            comp,
            volume,
            pools: vec![0; nspecs as usize].into_boxed_slice(),
            clamped: vec![false; nspecs as usize].into_boxed_slice(),
            neighbors,
            distances,
            areas,
            kprocs: SmallVec::new(),
        }
    }

    /// The compartment this voxel belongs to.
    pub fn comp(&self) -> CompId {
        self.comp
    }

    /// Voxel volume in cubic meters.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Molecule count of a local species.
    pub fn count(&self, spec: LocalSpecId) -> u32 {
        self.pools[spec.0 as usize]
    }

    /// Overwrite the molecule count of a local species.
    ///
    /// Ignores the clamp flag: explicit writes express user intent, the
    /// clamp only shields a pool from reaction and diffusion updates.
    pub fn set_count(&mut self, spec: LocalSpecId, count: u32) {
        self.pools[spec.0 as usize] = count;
    }

    /// Whether a local species is clamped.
    pub fn clamped(&self, spec: LocalSpecId) -> bool {
        self.clamped[spec.0 as usize]
    }

    /// Set or clear the clamp flag of a local species.
    pub fn set_clamped(&mut self, spec: LocalSpecId, clamped: bool) {
        self.clamped[spec.0 as usize] = clamped;
    }

    /// Apply a stoichiometry delta to a pool, unless it is clamped.
    pub fn apply_delta(&mut self, spec: LocalSpecId, delta: i32) {
        let i = spec.0 as usize;
        if self.clamped[i] {
            return;
        }
        let next = i64::from(self.pools[i]) + i64::from(delta);
        debug_assert!(next >= 0, "pool underflow in voxel pool {i}");
        self.pools[i] = next.max(0) as u32;
    }

    /// All pools, in local species order.
    pub fn pools(&self) -> &[u32] {
        &self.pools
    }

    /// All clamp flags, in local species order.
    pub fn clamp_flags(&self) -> &[bool] {
        &self.clamped
    }

    /// Neighbor voxel per adjacency slot.
    pub fn neighbors(&self) -> &[Option<VoxelId>; 4] {
        &self.neighbors
    }

    /// Center-to-center distance of a linked slot.
    pub fn distance(&self, slot: usize) -> f64 {
        self.distances[slot]
    }

    /// Shared-face area of a linked slot.
    pub fn area(&self, slot: usize) -> f64 {
        self.areas[slot]
    }

    /// Kinetic processes hosted in this voxel.
    pub fn kprocs(&self) -> &[KProcId] {
        &self.kprocs
    }

    /// Register a kinetic process as hosted in this voxel.
    pub fn add_kproc(&mut self, kproc: KProcId) {
        self.kprocs.push(kproc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voxel() -> Voxel {
        Voxel::new(
            CompId(0),
            1.0e-18,
            3,
            [Some(VoxelId(1)), None, None, None],
            [1.0e-6, 0.0, 0.0, 0.0],
            [1.0e-13, 0.0, 0.0, 0.0],
        )
    }

    #[test]
    fn deltas_move_pools() {
        let mut v = voxel();
        v.apply_delta(LocalSpecId(1), 5);
        v.apply_delta(LocalSpecId(1), -2);
        assert_eq!(v.count(LocalSpecId(1)), 3);
        assert_eq!(v.count(LocalSpecId(0)), 0);
    }

    #[test]
    fn clamped_pools_ignore_deltas_but_not_writes() {
        let mut v = voxel();
        v.set_count(LocalSpecId(0), 10);
        v.set_clamped(LocalSpecId(0), true);
        v.apply_delta(LocalSpecId(0), -4);
        assert_eq!(v.count(LocalSpecId(0)), 10);
        v.set_count(LocalSpecId(0), 7);
        assert_eq!(v.count(LocalSpecId(0)), 7);
    }

    #[test]
    fn kproc_registration_preserves_order() {
        let mut v = voxel();
        v.add_kproc(KProcId(4));
        v.add_kproc(KProcId(2));
        assert_eq!(v.kprocs(), &[KProcId(4), KProcId(2)]);
    }
}
