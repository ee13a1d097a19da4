//! Directed volume diffusion hops.

use tessera_core::{DiffId, KProcId, LocalSpecId, VoxelId};
use tessera_mesh::Mesh;
use tessera_model::{Diffdef, Statedef};

use crate::kproc::Activity;

/// One directed diffusive hop: a single ligand moving from `src` through
/// one adjacency slot into `dst`.
///
/// Both voxels lie in the same compartment, so one local species id serves
/// both ends. The geometry factor `area / (volume · distance)` is fixed at
/// construction; the hop propensity is `dcst · scale · n_src`.
#[derive(Clone, Debug)]
pub struct Diff {
    id: KProcId,
    diff: DiffId,
    src: VoxelId,
    dst: VoxelId,
    lig: LocalSpecId,
    activity: Activity,
    extent: u64,
    dcst: f64,
    scale: f64,
    ccst: f64,
}

impl Diff {
    /// Instantiate a hop for `def`'s ligand out of `src` slot `slot` with
    /// nominal diffusion constant `dcst`.
    pub fn new(
        id: KProcId,
        def: &Diffdef,
        statedef: &Statedef,
        mesh: &Mesh,
        src: VoxelId,
        dst: VoxelId,
        slot: usize,
        dcst: f64,
    ) -> Self {
        let vox = mesh.voxel(src);
        debug_assert_eq!(vox.neighbors()[slot], Some(dst));
        debug_assert_eq!(vox.comp(), mesh.voxel(dst).comp());
        let compdef = statedef.comp(vox.comp());
        let lig = match compdef.g2l(def.lig()) {
            Some(l) => l,
            None => unreachable!("ligand {} not resident in host compartment", def.lig()),
        };
        let scale = vox.area(slot) / (vox.volume() * vox.distance(slot));
        Self {
            id,
            diff: def.id(),
            src,
            dst,
            lig,
            activity: Activity::Active,
            extent: 0,
            dcst,
            scale,
            ccst: dcst * scale,
        }
    }

    /// The process id.
    pub fn id(&self) -> KProcId {
        self.id
    }

    /// The diffusion rule this instantiates.
    pub fn diff(&self) -> DiffId {
        self.diff
    }

    /// Source voxel.
    pub fn src(&self) -> VoxelId {
        self.src
    }

    /// Destination voxel.
    pub fn dst(&self) -> VoxelId {
        self.dst
    }

    /// The ligand, in the shared compartment-local space.
    pub fn lig(&self) -> LocalSpecId {
        self.lig
    }

    /// Current activity.
    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Set the activity.
    pub fn set_activity(&mut self, activity: Activity) {
        self.activity = activity;
    }

    /// Nominal diffusion constant.
    pub fn dcst(&self) -> f64 {
        self.dcst
    }

    /// Replace the nominal constant and rescale.
    pub fn set_dcst(&mut self, dcst: f64) {
        self.dcst = dcst;
        self.ccst = dcst * self.scale;
    }

    /// Scaled hop constant.
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

    /// Current propensity: `ccst · n_src`.
    pub fn rate(&self, mesh: &Mesh) -> f64 {
        if !self.activity.is_active() {
            return 0.0;
        }
        self.ccst * f64::from(mesh.voxel(self.src).count(self.lig))
    }

    /// Fire once: move one ligand molecule from `src` to `dst`.
    pub fn apply(&mut self, mesh: &mut Mesh) {
        mesh.voxel_mut(self.src).apply_delta(self.lig, -1);
        mesh.voxel_mut(self.dst).apply_delta(self.lig, 1);
        self.extent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::CompId;
    use tessera_mesh::{MeshSpec, VoxelDecl};
    use tessera_model::{CompDecl, DiffDecl, ModelSpec};

    const VOL: f64 = 1.0e-18;
    const DIST: f64 = 1.0e-6;
    const XAREA: f64 = 1.0e-13;
    const DCST: f64 = 1.0e-12;

    fn fixture() -> (Statedef, Mesh) {
        let mut m = ModelSpec::new();
        let a = m.add_species("A");
        let d = m.add_diff(DiffDecl {
            name: "dA".into(),
            lig: a,
            dcst: DCST,
        });
        m.add_comp(CompDecl {
            name: "cyt".into(),
            diffs: vec![d],
            ..Default::default()
        });
        let sd = Statedef::build(&m).unwrap();
        let mut ms = MeshSpec::new();
        ms.add_voxel(VoxelDecl::new(CompId(0), VOL).link(0, VoxelId(1), DIST, XAREA));
        ms.add_voxel(VoxelDecl::new(CompId(0), VOL).link(0, VoxelId(0), DIST, XAREA));
        let mesh = Mesh::build(&sd, &ms).unwrap();
        (sd, mesh)
    }

    fn hop(sd: &Statedef, mesh: &Mesh) -> Diff {
        let def = sd.diff(sd.diff_by_name("dA").unwrap());
        Diff::new(
            KProcId(0),
            def,
            sd,
            mesh,
            VoxelId(0),
            VoxelId(1),
            0,
            def.dcst(),
        )
    }

    #[test]
    fn geometry_factor_is_area_over_volume_distance() {
        let (sd, mesh) = fixture();
        let k = hop(&sd, &mesh);
        assert_eq!(k.ccst(), DCST * XAREA / (VOL * DIST));
    }

    #[test]
    fn rate_is_linear_in_source_count() {
        let (sd, mut mesh) = fixture();
        let k = hop(&sd, &mesh);
        mesh.voxel_mut(VoxelId(0)).set_count(k.lig(), 12);
        assert_eq!(k.rate(&mesh), k.ccst() * 12.0);
        mesh.voxel_mut(VoxelId(1)).set_count(k.lig(), 99);
        // Destination counts never enter the hop rate.
        assert_eq!(k.rate(&mesh), k.ccst() * 12.0);
    }

    #[test]
    fn apply_moves_one_molecule() {
        let (sd, mut mesh) = fixture();
        let mut k = hop(&sd, &mesh);
        mesh.voxel_mut(VoxelId(0)).set_count(k.lig(), 3);
        k.apply(&mut mesh);
        assert_eq!(mesh.voxel(VoxelId(0)).count(k.lig()), 2);
        assert_eq!(mesh.voxel(VoxelId(1)).count(k.lig()), 1);
        assert_eq!(k.extent(), 1);
    }

    #[test]
    fn clamped_source_feeds_without_draining() {
        let (sd, mut mesh) = fixture();
        let mut k = hop(&sd, &mesh);
        mesh.voxel_mut(VoxelId(0)).set_count(k.lig(), 5);
        mesh.voxel_mut(VoxelId(0)).set_clamped(k.lig(), true);
        k.apply(&mut mesh);
        assert_eq!(mesh.voxel(VoxelId(0)).count(k.lig()), 5);
        assert_eq!(mesh.voxel(VoxelId(1)).count(k.lig()), 1);
    }
}
