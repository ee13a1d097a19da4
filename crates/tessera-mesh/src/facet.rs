//! Facet state: surface pools, clamp flags, membrane potential, and frozen
//! adjacency.

use smallvec::SmallVec;
use tessera_core::{FacetId, KProcId, LocalSpecId, PatchId, VoxelId};

/// A single triangular membrane facet at simulation time.
///
/// Pools are indexed by the owning patch's local species space. The facet
/// carries its own membrane potential; voltage-dependent transitions read
/// it when computing their rates.
#[derive(Clone, Debug)]
pub struct Facet {
    patch: PatchId,
    area: f64,
    inner: VoxelId,
    outer: Option<VoxelId>,
    potential: f64,
    pools: Box<[u32]>,
    clamped: Box<[bool]>,
    neighbors: [Option<FacetId>; 3],
    distances: [f64; 3],
    lengths: [f64; 3],
    kprocs: SmallVec<[KProcId; 8]>,
}

impl Facet {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        patch: PatchId,
        area: f64,
        inner: VoxelId,
        outer: Option<VoxelId>,
        potential: f64,
        nspecs: u32,
        neighbors: [Option<FacetId>; 3],
        distances: [f64; 3],
        lengths: [f64; 3],
    ) -> Self {
        Self {
            patch,
            area,
            inner,
            outer,
            potential,
            pools: vec![0; nspecs as usize].into_boxed_slice(),
            clamped: vec![false; nspecs as usize].into_boxed_slice(),
            neighbors,
            distances,
            lengths,
            kprocs: SmallVec::new(),
        }
    }

    /// The patch this facet belongs to.
    pub fn patch(&self) -> PatchId {
        self.patch
    }

    /// Facet area in square meters.
    pub fn area(&self) -> f64 {
        self.area
    }

    /// The voxel on the inner side.
    pub fn inner(&self) -> VoxelId {
        self.inner
    }

    /// The voxel on the outer side, if the patch has one.
    pub fn outer(&self) -> Option<VoxelId> {
        self.outer
    }

    /// Membrane potential across this facet, in volts.
    pub fn potential(&self) -> f64 {
        self.potential
    }

    /// Overwrite the membrane potential.
    pub fn set_potential(&mut self, potential: f64) {
        self.potential = potential;
    }

    /// Molecule count of a local species.
    pub fn count(&self, spec: LocalSpecId) -> u32 {
        self.pools[spec.0 as usize]
    }

    /// Overwrite the molecule count of a local species.
    ///
    /// Ignores the clamp flag, like
    /// [`Voxel::set_count`](crate::Voxel::set_count).
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
        debug_assert!(next >= 0, "pool underflow in facet pool {i}");
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

    /// Neighbor facet per adjacency slot.
    pub fn neighbors(&self) -> &[Option<FacetId>; 3] {
        &self.neighbors
    }

    /// Center-to-center distance of a linked slot.
    pub fn distance(&self, slot: usize) -> f64 {
        self.distances[slot]
    }

    /// Shared-edge length of a linked slot.
    pub fn length(&self, slot: usize) -> f64 {
        self.lengths[slot]
    }

    /// Kinetic processes hosted on this facet.
    pub fn kprocs(&self) -> &[KProcId] {
        &self.kprocs
    }

    /// Register a kinetic process as hosted on this facet.
    pub fn add_kproc(&mut self, kproc: KProcId) {
        self.kprocs.push(kproc);
    }
}
