//! Surface reactions.

use tessera_core::{FacetId, KProcId, LocalSpecId, SReacId, VoxelId};
use tessera_mesh::Mesh;
use tessera_model::{SReacdef, Statedef};

use crate::kproc::{area_scale, falling_factorial, localize, volume_scale, Activity};

/// One surface reaction instantiated on one facet.
///
/// Keeps per-side stoichiometry resolved into three local species spaces:
/// the host facet's patch, the inner voxel's compartment, and (when the
/// patch borders one) the outer voxel's compartment. The inner and outer
/// voxels are resolved once at construction; an absent outer voxel implies
/// empty outer stoichiometry, which model and mesh compilation enforce
/// together.
#[derive(Clone, Debug)]
pub struct SReac {
    id: KProcId,
    sreac: SReacId,
    facet: FacetId,
    ivoxel: VoxelId,
    ovoxel: Option<VoxelId>,
    activity: Activity,
    extent: u64,
    kcst: f64,
    scale: f64,
    ccst: f64,
    ilhs: Box<[(LocalSpecId, u32)]>,
    slhs: Box<[(LocalSpecId, u32)]>,
    olhs: Box<[(LocalSpecId, u32)]>,
    iupd: Box<[(LocalSpecId, i32)]>,
    supd: Box<[(LocalSpecId, i32)]>,
    oupd: Box<[(LocalSpecId, i32)]>,
}

impl SReac {
    /// Instantiate a surface reaction definition on `facet` with nominal
    /// constant `kcst`.
    pub fn new(
        id: KProcId,
        def: &SReacdef,
        statedef: &Statedef,
        mesh: &Mesh,
        facet: FacetId,
        kcst: f64,
    ) -> Self {
        let f = mesh.facet(facet);
        let patchdef = statedef.patch(f.patch());
        let ivox = mesh.voxel(f.inner());
        let icompdef = statedef.comp(ivox.comp());

        let scale = if def.surface_surface() {
            area_scale(f.area(), def.order())
        } else if def.inner() {
            volume_scale(ivox.volume(), def.order())
        } else {
            match f.outer() {
                Some(o) => volume_scale(mesh.voxel(o).volume(), def.order()),
                None => unreachable!("outer reactants require an outer voxel"),
            }
        };

        let (olhs, oupd) = match f.outer() {
            Some(o) => {
                let ocompdef = statedef.comp(mesh.voxel(o).comp());
                (
                    localize(def.olhs(), |s| ocompdef.g2l(s)),
                    localize(def.oupd(), |s| ocompdef.g2l(s)),
                )
            }
            None => {
                debug_assert!(def.olhs().is_empty() && def.oupd().is_empty());
                (Box::default(), Box::default())
            }
        };

        Self {
            id,
            sreac: def.id(),
            facet,
            ivoxel: f.inner(),
            ovoxel: f.outer(),
            activity: Activity::Active,
            extent: 0,
            kcst,
            scale,
            ccst: kcst * scale,
            ilhs: localize(def.ilhs(), |s| icompdef.g2l(s)),
            slhs: localize(def.slhs(), |s| patchdef.g2l(s)),
            olhs,
            iupd: localize(def.iupd(), |s| icompdef.g2l(s)),
            supd: localize(def.supd(), |s| patchdef.g2l(s)),
            oupd,
        }
    }

    /// The process id.
    pub fn id(&self) -> KProcId {
        self.id
    }

    /// The surface reaction definition this instantiates.
    pub fn sreac(&self) -> SReacId {
        self.sreac
    }

    /// The host facet.
    pub fn facet(&self) -> FacetId {
        self.facet
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

    /// Current propensity across all three sides.
    pub fn rate(&self, mesh: &Mesh) -> f64 {
        if !self.activity.is_active() {
            return 0.0;
        }
        let facet = mesh.facet(self.facet);
        let mut h = 1.0;
        for &(spec, coeff) in self.slhs.iter() {
            h *= falling_factorial(facet.count(spec), coeff);
        }
        if !self.ilhs.is_empty() {
            let ivox = mesh.voxel(self.ivoxel);
            for &(spec, coeff) in self.ilhs.iter() {
                h *= falling_factorial(ivox.count(spec), coeff);
            }
        }
        if let Some(o) = self.ovoxel {
            if !self.olhs.is_empty() {
                let ovox = mesh.voxel(o);
                for &(spec, coeff) in self.olhs.iter() {
                    h *= falling_factorial(ovox.count(spec), coeff);
                }
            }
        }
        self.ccst * h
    }

    /// Fire once.
    pub fn apply(&mut self, mesh: &mut Mesh) {
        let facet = mesh.facet_mut(self.facet);
        for &(spec, delta) in self.supd.iter() {
            facet.apply_delta(spec, delta);
        }
        if !self.iupd.is_empty() {
            let ivox = mesh.voxel_mut(self.ivoxel);
            for &(spec, delta) in self.iupd.iter() {
                ivox.apply_delta(spec, delta);
            }
        }
        if let Some(o) = self.ovoxel {
            if !self.oupd.is_empty() {
                let ovox = mesh.voxel_mut(o);
                for &(spec, delta) in self.oupd.iter() {
                    ovox.apply_delta(spec, delta);
                }
            }
        }
        self.extent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::consts::AVOGADRO;
    use tessera_core::{CompId, PatchId};
    use tessera_mesh::{FacetDecl, MeshSpec, VoxelDecl};
    use tessera_model::{CompDecl, ModelSpec, PatchDecl, SReacDecl};

    const VOL: f64 = 2.0e-18;
    const AREA: f64 = 1.0e-13;

    // Channel flip (surface only) and ligand binding (inner volume bound).
    fn fixture() -> (Statedef, Mesh) {
        let mut m = ModelSpec::new();
        let a = m.add_species("A");
        let closed = m.add_species("Ch_closed");
        let open = m.add_species("Ch_open");
        let flip = m.add_sreac(SReacDecl {
            name: "flip".into(),
            slhs: vec![(closed, 1)],
            srhs: vec![(open, 1)],
            kcst: 5.0,
            ..Default::default()
        });
        let bind = m.add_sreac(SReacDecl {
            name: "bind".into(),
            ilhs: vec![(a, 1)],
            slhs: vec![(closed, 1)],
            srhs: vec![(open, 1)],
            kcst: 1.0e8,
            ..Default::default()
        });
        m.add_comp(CompDecl {
            name: "cyt".into(),
            ..Default::default()
        });
        m.add_patch(PatchDecl {
            name: "memb".into(),
            icomp: CompId(0),
            ocomp: None,
            sreacs: vec![flip, bind],
            sdiffs: vec![],
            vdeptrans: vec![],
            species: vec![],
            init_potential: 0.0,
        });
        let sd = Statedef::build(&m).unwrap();
        let mut ms = MeshSpec::new();
        let v = ms.add_voxel(VoxelDecl::new(CompId(0), VOL));
        ms.add_facet(FacetDecl::new(PatchId(0), AREA, v));
        let mesh = Mesh::build(&sd, &ms).unwrap();
        (sd, mesh)
    }

    fn patch_local(sd: &Statedef, name: &str) -> LocalSpecId {
        sd.patch(PatchId(0))
            .g2l(sd.spec_by_name(name).unwrap())
            .unwrap()
    }

    fn comp_local(sd: &Statedef, name: &str) -> LocalSpecId {
        sd.comp(CompId(0))
            .g2l(sd.spec_by_name(name).unwrap())
            .unwrap()
    }

    #[test]
    fn pure_surface_reaction_scales_by_area() {
        let (sd, mesh) = fixture();
        let def = sd.sreac(sd.sreac_by_name("flip").unwrap());
        let k = SReac::new(KProcId(0), def, &sd, &mesh, FacetId(0), def.kcst());
        // Order 1: no scaling at all.
        assert_eq!(k.ccst(), 5.0);

        // Force a second-order surface reaction to see the area factor.
        let mut m2 = ModelSpec::new();
        let x = m2.add_species("X");
        let x2 = m2.add_species("X2");
        let dimer = m2.add_sreac(SReacDecl {
            name: "dimer".into(),
            slhs: vec![(x, 2)],
            srhs: vec![(x2, 1)],
            kcst: 7.0,
            ..Default::default()
        });
        m2.add_comp(CompDecl {
            name: "cyt".into(),
            ..Default::default()
        });
        m2.add_patch(PatchDecl {
            name: "memb".into(),
            icomp: CompId(0),
            ocomp: None,
            sreacs: vec![dimer],
            sdiffs: vec![],
            vdeptrans: vec![],
            species: vec![],
            init_potential: 0.0,
        });
        let sd2 = Statedef::build(&m2).unwrap();
        let mut ms2 = MeshSpec::new();
        let v = ms2.add_voxel(VoxelDecl::new(CompId(0), VOL));
        ms2.add_facet(FacetDecl::new(PatchId(0), AREA, v));
        let mesh2 = Mesh::build(&sd2, &ms2).unwrap();
        let def2 = sd2.sreac(sd2.sreac_by_name("dimer").unwrap());
        let k2 = SReac::new(KProcId(0), def2, &sd2, &mesh2, FacetId(0), def2.kcst());
        assert_eq!(k2.ccst(), 7.0 / (AREA * AVOGADRO));
    }

    #[test]
    fn volume_coupled_reaction_scales_by_inner_volume() {
        let (sd, mesh) = fixture();
        let def = sd.sreac(sd.sreac_by_name("bind").unwrap());
        let k = SReac::new(KProcId(0), def, &sd, &mesh, FacetId(0), def.kcst());
        assert_eq!(k.ccst(), 1.0e8 / (1.0e3 * VOL * AVOGADRO));
    }

    #[test]
    fn rate_multiplies_across_sides() {
        let (sd, mut mesh) = fixture();
        let def = sd.sreac(sd.sreac_by_name("bind").unwrap());
        let k = SReac::new(KProcId(0), def, &sd, &mesh, FacetId(0), def.kcst());
        mesh.voxel_mut(VoxelId(0)).set_count(comp_local(&sd, "A"), 6);
        mesh.facet_mut(FacetId(0))
            .set_count(patch_local(&sd, "Ch_closed"), 3);
        assert_eq!(k.rate(&mesh), k.ccst() * 18.0);
    }

    #[test]
    fn apply_updates_facet_and_inner_voxel() {
        let (sd, mut mesh) = fixture();
        let def = sd.sreac(sd.sreac_by_name("bind").unwrap());
        let mut k = SReac::new(KProcId(0), def, &sd, &mesh, FacetId(0), def.kcst());
        let la = comp_local(&sd, "A");
        let lclosed = patch_local(&sd, "Ch_closed");
        let lopen = patch_local(&sd, "Ch_open");
        mesh.voxel_mut(VoxelId(0)).set_count(la, 2);
        mesh.facet_mut(FacetId(0)).set_count(lclosed, 2);
        k.apply(&mut mesh);
        assert_eq!(mesh.voxel(VoxelId(0)).count(la), 1);
        assert_eq!(mesh.facet(FacetId(0)).count(lclosed), 1);
        assert_eq!(mesh.facet(FacetId(0)).count(lopen), 1);
        assert_eq!(k.extent(), 1);
    }
}
