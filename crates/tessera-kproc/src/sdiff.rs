//! Directed surface diffusion hops.

use tessera_core::{FacetId, KProcId, LocalSpecId, SDiffId};
use tessera_mesh::Mesh;
use tessera_model::{Statedef, SurfDiffdef};

use crate::kproc::Activity;

/// One directed surface hop: a ligand moving from facet `src` across one
/// shared edge into facet `dst`, both on the same patch.
///
/// The geometry factor is `edge_length / (area · distance)`, the
/// two-dimensional analogue of the volume hop factor.
#[derive(Clone, Debug)]
pub struct SDiff {
    id: KProcId,
    sdiff: SDiffId,
    src: FacetId,
    dst: FacetId,
    lig: LocalSpecId,
    activity: Activity,
    extent: u64,
    dcst: f64,
    scale: f64,
    ccst: f64,
}

impl SDiff {
    /// Instantiate a hop for `def`'s ligand out of `src` slot `slot` with
    /// nominal diffusion constant `dcst`.
    pub fn new(
        id: KProcId,
        def: &SurfDiffdef,
        statedef: &Statedef,
        mesh: &Mesh,
        src: FacetId,
        dst: FacetId,
        slot: usize,
        dcst: f64,
    ) -> Self {
        let facet = mesh.facet(src);
        debug_assert_eq!(facet.neighbors()[slot], Some(dst));
        debug_assert_eq!(facet.patch(), mesh.facet(dst).patch());
        let patchdef = statedef.patch(facet.patch());
        let lig = match patchdef.g2l(def.lig()) {
            Some(l) => l,
            None => unreachable!("ligand {} not resident in host patch", def.lig()),
        };
        let scale = facet.length(slot) / (facet.area() * facet.distance(slot));
        Self {
            id,
            sdiff: def.id(),
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

    /// The surface diffusion rule this instantiates.
    pub fn sdiff(&self) -> SDiffId {
        self.sdiff
    }

    /// Source facet.
    pub fn src(&self) -> FacetId {
        self.src
    }

    /// Destination facet.
    pub fn dst(&self) -> FacetId {
        self.dst
    }

    /// The ligand, in the shared patch-local space.
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
        self.ccst * f64::from(mesh.facet(self.src).count(self.lig))
    }

    /// Fire once: move one ligand molecule from `src` to `dst`.
    pub fn apply(&mut self, mesh: &mut Mesh) {
        mesh.facet_mut(self.src).apply_delta(self.lig, -1);
        mesh.facet_mut(self.dst).apply_delta(self.lig, 1);
        self.extent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{CompId, PatchId, VoxelId};
    use tessera_mesh::{FacetDecl, MeshSpec, VoxelDecl};
    use tessera_model::{CompDecl, ModelSpec, PatchDecl, SDiffDecl};

    const AREA: f64 = 1.0e-13;
    const DIST: f64 = 5.0e-7;
    const EDGE: f64 = 4.0e-7;
    const DCST: f64 = 1.0e-13;

    fn fixture() -> (Statedef, Mesh) {
        let mut m = ModelSpec::new();
        let s = m.add_species("S");
        let d = m.add_sdiff(SDiffDecl {
            name: "dS".into(),
            lig: s,
            dcst: DCST,
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
            sdiffs: vec![d],
            vdeptrans: vec![],
            species: vec![],
            init_potential: 0.0,
        });
        let sd = Statedef::build(&m).unwrap();
        let mut ms = MeshSpec::new();
        let v0 = ms.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        let v1 = ms.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        ms.add_facet(FacetDecl::new(PatchId(0), AREA, v0).link(0, FacetId(1), DIST, EDGE));
        ms.add_facet(FacetDecl::new(PatchId(0), AREA, v1).link(0, FacetId(0), DIST, EDGE));
        let mesh = Mesh::build(&sd, &ms).unwrap();
        (sd, mesh)
    }

    fn hop(sd: &Statedef, mesh: &Mesh) -> SDiff {
        let def = sd.sdiff(sd.sdiff_by_name("dS").unwrap());
        SDiff::new(
            KProcId(0),
            def,
            sd,
            mesh,
            FacetId(0),
            FacetId(1),
            0,
            def.dcst(),
        )
    }

    #[test]
    fn geometry_factor_is_edge_over_area_distance() {
        let (sd, mesh) = fixture();
        let k = hop(&sd, &mesh);
        assert_eq!(k.ccst(), DCST * EDGE / (AREA * DIST));
    }

    #[test]
    fn apply_moves_one_molecule_between_facets() {
        let (sd, mut mesh) = fixture();
        let mut k = hop(&sd, &mesh);
        mesh.facet_mut(FacetId(0)).set_count(k.lig(), 2);
        k.apply(&mut mesh);
        assert_eq!(mesh.facet(FacetId(0)).count(k.lig()), 1);
        assert_eq!(mesh.facet(FacetId(1)).count(k.lig()), 1);
        assert_eq!(k.rate(&mesh), k.ccst());
    }
}
