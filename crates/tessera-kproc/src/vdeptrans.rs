//! Voltage-dependent transitions.

use tessera_core::{FacetId, KProcId, LocalSpecId, VDepTransId};
use tessera_mesh::Mesh;
use tessera_model::Statedef;

use crate::kproc::Activity;

/// One voltage-dependent channel-state transition on one facet.
///
/// The per-channel rate comes from the definition's voltage table at the
/// facet's current potential, so unlike every other process kind there is
/// no cached scaled constant; the propensity is `n_src · rate_at(V)`
/// evaluated fresh on every query.
#[derive(Clone, Debug)]
pub struct VDepTrans {
    id: KProcId,
    trans: VDepTransId,
    facet: FacetId,
    src: LocalSpecId,
    dst: LocalSpecId,
    activity: Activity,
    extent: u64,
}

impl VDepTrans {
    /// Instantiate a transition definition on `facet`.
    pub fn new(
        id: KProcId,
        trans: VDepTransId,
        statedef: &Statedef,
        mesh: &Mesh,
        facet: FacetId,
    ) -> Self {
        let def = statedef.vdep_trans(trans);
        let patchdef = statedef.patch(mesh.facet(facet).patch());
        let resolve = |spec| match patchdef.g2l(spec) {
            Some(l) => l,
            None => unreachable!("state {spec} not resident in host patch"),
        };
        Self {
            id,
            trans,
            facet,
            src: resolve(def.src()),
            dst: resolve(def.dst()),
            activity: Activity::Active,
            extent: 0,
        }
    }

    /// The process id.
    pub fn id(&self) -> KProcId {
        self.id
    }

    /// The transition definition this instantiates.
    pub fn trans(&self) -> VDepTransId {
        self.trans
    }

    /// The host facet.
    pub fn facet(&self) -> FacetId {
        self.facet
    }

    /// Source state, in the patch-local space.
    pub fn src(&self) -> LocalSpecId {
        self.src
    }

    /// Destination state, in the patch-local space.
    pub fn dst(&self) -> LocalSpecId {
        self.dst
    }

    /// Current activity.
    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Set the activity.
    pub fn set_activity(&mut self, activity: Activity) {
        self.activity = activity;
    }

    /// Times fired.
    pub fn extent(&self) -> u64 {
        self.extent
    }

    pub(crate) fn load_counters(&mut self, extent: u64, activity: Activity) {
        self.extent = extent;
        self.activity = activity;
    }

    /// Current propensity: `n_src · rate_at(V)` at the facet's potential.
    ///
    /// # Panics
    ///
    /// Panics if the facet potential has escaped the table's voltage range;
    /// the solver validates every potential write against attached tables,
    /// so this indicates a missed validation path.
    pub fn rate(&self, statedef: &Statedef, mesh: &Mesh) -> f64 {
        if !self.activity.is_active() {
            return 0.0;
        }
        let facet = mesh.facet(self.facet);
        let n = facet.count(self.src);
        if n == 0 {
            return 0.0;
        }
        f64::from(n) * statedef.vdep_trans(self.trans).rate_at(facet.potential())
    }

    /// Fire once: flip one channel from the source to the destination
    /// state.
    pub fn apply(&mut self, mesh: &mut Mesh) {
        let facet = mesh.facet_mut(self.facet);
        facet.apply_delta(self.src, -1);
        facet.apply_delta(self.dst, 1);
        self.extent += 1;
    }
}
