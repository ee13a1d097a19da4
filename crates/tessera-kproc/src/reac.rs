//! Volume reactions.

use tessera_core::{KProcId, LocalSpecId, ReacId, VoxelId};
use tessera_mesh::Mesh;
use tessera_model::{Reacdef, Statedef};

use crate::kproc::{falling_factorial, localize, volume_scale, Activity};

/// One volume reaction instantiated in one voxel.
///
/// Stoichiometry is resolved to the host compartment's local species space
/// at construction; `rate` and `apply` touch nothing but the host voxel.
/// The scaled constant is `kcst · scale` where `scale` depends only on the
/// voxel volume and the reaction order, both fixed, so constant edits
/// rescale without consulting the mesh.
#[derive(Clone, Debug)]
pub struct Reac {
    id: KProcId,
    reac: ReacId,
    voxel: VoxelId,
    activity: Activity,
    extent: u64,
    kcst: f64,
    scale: f64,
    ccst: f64,
    lhs: Box<[(LocalSpecId, u32)]>,
    upd: Box<[(LocalSpecId, i32)]>,
}

impl Reac {
    /// Instantiate a reaction definition in `voxel` with nominal constant
    /// `kcst`.
    pub fn new(
        id: KProcId,
        def: &Reacdef,
        statedef: &Statedef,
        mesh: &Mesh,
        voxel: VoxelId,
        kcst: f64,
    ) -> Self {
        let vox = mesh.voxel(voxel);
        let compdef = statedef.comp(vox.comp());
        let scale = volume_scale(vox.volume(), def.order());
        Self {
            id,
            reac: def.id(),
            voxel,
            activity: Activity::Active,
            extent: 0,
            kcst,
            scale,
            ccst: kcst * scale,
            lhs: localize(def.lhs(), |s| compdef.g2l(s)),
            upd: localize(def.upd(), |s| compdef.g2l(s)),
        }
    }

    /// The process id.
    pub fn id(&self) -> KProcId {
        self.id
    }

    /// The reaction definition this instantiates.
    pub fn reac(&self) -> ReacId {
        self.reac
    }

    /// The host voxel.
    pub fn voxel(&self) -> VoxelId {
        self.voxel
    }

    /// Current activity.
    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Set the activity.
    pub fn set_activity(&mut self, activity: Activity) {
        self.activity = activity;
    }

    /// Nominal rate constant.
    pub fn kcst(&self) -> f64 {
        self.kcst
    }

    /// Replace the nominal constant and rescale.
    pub fn set_kcst(&mut self, kcst: f64) {
        self.kcst = kcst;
        self.ccst = kcst * self.scale;
    }

    /// Scaled stochastic constant.
    pub fn ccst(&self) -> f64 {
        self.ccst
    }

    /// Times fired.
    pub fn extent(&self) -> u64 {
        self.extent
    }

    pub(crate) fn load_counters(&mut self, extent: u64, activity: Activity) {
        self.extent = extent;
        self.activity = activity;
    }

    /// Current propensity.
    pub fn rate(&self, mesh: &Mesh) -> f64 {
        if !self.activity.is_active() {
            return 0.0;
        }
        let vox = mesh.voxel(self.voxel);
        let mut h = 1.0;
        for &(spec, coeff) in self.lhs.iter() {
            h *= falling_factorial(vox.count(spec), coeff);
        }
        self.ccst * h
    }

    /// Fire once.
    pub fn apply(&mut self, mesh: &mut Mesh) {
        let vox = mesh.voxel_mut(self.voxel);
        for &(spec, delta) in self.upd.iter() {
            vox.apply_delta(spec, delta);
        }
        self.extent += 1;
    }
}
