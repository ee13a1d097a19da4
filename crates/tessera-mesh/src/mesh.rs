//! The compiled mesh.

use tessera_core::{CompId, FacetId, PatchId, VoxelId};
use tessera_model::Statedef;

use crate::error::MeshError;
use crate::facet::Facet;
use crate::spec::MeshSpec;
use crate::voxel::Voxel;

/// The compiled simulation geometry.
///
/// Owns every voxel and facet plus the reverse indexes the solver leans
/// on: which voxels make up each compartment, which facets make up each
/// patch, and which facets touch each voxel. Total compartment volumes and
/// patch areas are precomputed at build time since the geometry is frozen.
#[derive(Clone, Debug)]
pub struct Mesh {
    voxels: Box<[Voxel]>,
    facets: Box<[Facet]>,
    comp_voxels: Box<[Box<[VoxelId]>]>,
    patch_facets: Box<[Box<[FacetId]>]>,
    voxel_facets: Box<[Box<[FacetId]>]>,
    comp_vols: Box<[f64]>,
    patch_areas: Box<[f64]>,
}

impl Mesh {
    /// Compile a mesh description against a compiled model.
    ///
    /// Checks every compartment and patch assignment, every adjacency
    /// link, and every coupling measurement; sizes each element's pools
    /// from its container's local species space; and applies each patch's
    /// initial potential to its facets. On error nothing is constructed.
    pub fn build(statedef: &Statedef, spec: &MeshSpec) -> Result<Self, MeshError> {
        let nvoxels = spec.voxels.len() as u32;
        let nfacets = spec.facets.len() as u32;

        let mut voxels = Vec::with_capacity(spec.voxels.len());
        for (i, decl) in spec.voxels.iter().enumerate() {
            let vid = i as u32;
            if decl.comp.0 >= statedef.ncomps() {
                return Err(MeshError::UnknownCompartment {
                    voxel: vid,
                    comp: decl.comp.0,
                });
            }
            if !decl.volume.is_finite() || decl.volume <= 0.0 {
                return Err(MeshError::BadVolume {
                    voxel: vid,
                    volume: decl.volume,
                });
            }
            for (slot, neighbor) in decl.neighbors.iter().enumerate() {
                let Some(n) = neighbor else { continue };
                if n.0 >= nvoxels || n.0 == vid {
                    return Err(MeshError::VoxelNeighborOutOfRange {
                        voxel: vid,
                        slot,
                        neighbor: n.0,
                    });
                }
                let dist = decl.distances[slot];
                let area = decl.areas[slot];
                if !dist.is_finite() || dist <= 0.0 || !area.is_finite() || area <= 0.0 {
                    return Err(MeshError::BadVoxelCoupling { voxel: vid, slot });
                }
            }
            voxels.push(Voxel::new(
                decl.comp,
                decl.volume,
                statedef.comp(decl.comp).nspecs(),
                decl.neighbors,
                decl.distances,
                decl.areas,
            ));
        }

        let mut facets = Vec::with_capacity(spec.facets.len());
        for (i, decl) in spec.facets.iter().enumerate() {
            let fid = i as u32;
            if decl.patch.0 >= statedef.npatches() {
                return Err(MeshError::UnknownPatch {
                    facet: fid,
                    patch: decl.patch.0,
                });
            }
            let patchdef = statedef.patch(decl.patch);
            if !decl.area.is_finite() || decl.area <= 0.0 {
                return Err(MeshError::BadArea {
                    facet: fid,
                    area: decl.area,
                });
            }
            if decl.inner.0 >= nvoxels {
                return Err(MeshError::VoxelOutOfRange {
                    facet: fid,
                    voxel: decl.inner.0,
                });
            }
            let inner_comp = voxels[decl.inner.0 as usize].comp();
            if inner_comp != patchdef.icomp() {
                return Err(MeshError::InnerCompartmentMismatch {
                    facet: fid,
                    expected: statedef.comp(patchdef.icomp()).name().to_owned(),
                    found: statedef.comp(inner_comp).name().to_owned(),
                });
            }
            match (patchdef.ocomp(), decl.outer) {
                (Some(ocomp), Some(outer)) => {
                    if outer.0 >= nvoxels {
                        return Err(MeshError::VoxelOutOfRange {
                            facet: fid,
                            voxel: outer.0,
                        });
                    }
                    let outer_comp = voxels[outer.0 as usize].comp();
                    if outer_comp != ocomp {
                        return Err(MeshError::OuterCompartmentMismatch {
                            facet: fid,
                            expected: statedef.comp(ocomp).name().to_owned(),
                            found: statedef.comp(outer_comp).name().to_owned(),
                        });
                    }
                }
                (Some(_), None) => {
                    return Err(MeshError::MissingOuterVoxel {
                        facet: fid,
                        patch: patchdef.name().to_owned(),
                    });
                }
                (None, Some(_)) => {
                    return Err(MeshError::UnexpectedOuterVoxel {
                        facet: fid,
                        patch: patchdef.name().to_owned(),
                    });
                }
                (None, None) => {}
            }
            for (slot, neighbor) in decl.neighbors.iter().enumerate() {
                let Some(n) = neighbor else { continue };
                if n.0 >= nfacets || n.0 == fid {
                    return Err(MeshError::FacetNeighborOutOfRange {
                        facet: fid,
                        slot,
                        neighbor: n.0,
                    });
                }
                let dist = decl.distances[slot];
                let length = decl.lengths[slot];
                if !dist.is_finite() || dist <= 0.0 || !length.is_finite() || length <= 0.0 {
                    return Err(MeshError::BadFacetCoupling { facet: fid, slot });
                }
            }
            facets.push(Facet::new(
                decl.patch,
                decl.area,
                decl.inner,
                decl.outer,
                patchdef.init_potential(),
                patchdef.nspecs(),
                decl.neighbors,
                decl.distances,
                decl.lengths,
            ));
        }

        let mut comp_voxels = vec![Vec::new(); statedef.ncomps() as usize];
        let mut comp_vols = vec![0.0; statedef.ncomps() as usize];
        for (i, voxel) in voxels.iter().enumerate() {
            comp_voxels[voxel.comp().0 as usize].push(VoxelId(i as u32));
            comp_vols[voxel.comp().0 as usize] += voxel.volume();
        }
        let mut patch_facets = vec![Vec::new(); statedef.npatches() as usize];
        let mut patch_areas = vec![0.0; statedef.npatches() as usize];
        let mut voxel_facets = vec![Vec::new(); voxels.len()];
        for (i, facet) in facets.iter().enumerate() {
            let fid = FacetId(i as u32);
            patch_facets[facet.patch().0 as usize].push(fid);
            patch_areas[facet.patch().0 as usize] += facet.area();
            voxel_facets[facet.inner().0 as usize].push(fid);
            if let Some(outer) = facet.outer() {
                voxel_facets[outer.0 as usize].push(fid);
            }
        }

        Ok(Self {
            voxels: voxels.into_boxed_slice(),
            facets: facets.into_boxed_slice(),
            comp_voxels: comp_voxels.into_iter().map(Vec::into_boxed_slice).collect(),
            patch_facets: patch_facets.into_iter().map(Vec::into_boxed_slice).collect(),
            voxel_facets: voxel_facets.into_iter().map(Vec::into_boxed_slice).collect(),
            comp_vols: comp_vols.into_boxed_slice(),
            patch_areas: patch_areas.into_boxed_slice(),
        })
    }

    /// Number of voxels.
    pub fn nvoxels(&self) -> u32 {
        self.voxels.len() as u32
    }

    /// Number of facets.
    pub fn nfacets(&self) -> u32 {
        self.facets.len() as u32
    }

    /// All voxels, in id order.
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// All facets, in id order.
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Borrow a voxel.
    pub fn voxel(&self, id: VoxelId) -> &Voxel {
        &self.voxels[id.0 as usize]
    }

    /// Mutably borrow a voxel.
    pub fn voxel_mut(&mut self, id: VoxelId) -> &mut Voxel {
        &mut self.voxels[id.0 as usize]
    }

    /// Borrow a facet.
    pub fn facet(&self, id: FacetId) -> &Facet {
        &self.facets[id.0 as usize]
    }

    /// Mutably borrow a facet.
    pub fn facet_mut(&mut self, id: FacetId) -> &mut Facet {
        &mut self.facets[id.0 as usize]
    }

    /// The voxels making up a compartment.
    pub fn comp_voxels(&self, comp: CompId) -> &[VoxelId] {
        &self.comp_voxels[comp.0 as usize]
    }

    /// The facets making up a patch.
    pub fn patch_facets(&self, patch: PatchId) -> &[FacetId] {
        &self.patch_facets[patch.0 as usize]
    }

    /// The facets bordering a voxel, from either side.
    pub fn voxel_facets(&self, voxel: VoxelId) -> &[FacetId] {
        &self.voxel_facets[voxel.0 as usize]
    }

    /// Total volume of a compartment, in cubic meters.
    pub fn comp_vol(&self, comp: CompId) -> f64 {
        self.comp_vols[comp.0 as usize]
    }

    /// Total area of a patch, in square meters.
    pub fn patch_area(&self, patch: PatchId) -> f64 {
        self.patch_areas[patch.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{FacetDecl, VoxelDecl};
    use tessera_core::LocalSpecId;
    use tessera_model::{CompDecl, ModelSpec, PatchDecl};

    // One compartment holding species A, one patch holding species S.
    // `with_outer` adds a second compartment and makes the patch border it.
    fn statedef(with_outer: bool) -> Statedef {
        let mut m = ModelSpec::new();
        let a = m.add_species("A");
        let s = m.add_species("S");
        m.add_comp(CompDecl {
            name: "cyt".into(),
            species: vec![a],
            ..Default::default()
        });
        let ocomp = with_outer.then(|| {
            m.add_comp(CompDecl {
                name: "ext".into(),
                species: vec![a],
                ..Default::default()
            })
        });
        m.add_patch(PatchDecl {
            name: "memb".into(),
            icomp: CompId(0),
            ocomp,
            sreacs: vec![],
            sdiffs: vec![],
            vdeptrans: vec![],
            species: vec![s],
            init_potential: -0.07,
        });
        Statedef::build(&m).unwrap()
    }

    fn line_spec(volumes: &[f64]) -> MeshSpec {
        let mut spec = MeshSpec::new();
        for (i, &vol) in volumes.iter().enumerate() {
            let mut decl = VoxelDecl::new(CompId(0), vol);
            if i > 0 {
                decl = decl.link(0, VoxelId(i as u32 - 1), 1.0e-6, 1.0e-13);
            }
            if i + 1 < volumes.len() {
                decl = decl.link(1, VoxelId(i as u32 + 1), 1.0e-6, 1.0e-13);
            }
            spec.add_voxel(decl);
        }
        spec
    }

    #[test]
    fn builds_a_two_voxel_line() {
        let sd = statedef(false);
        let mesh = Mesh::build(&sd, &line_spec(&[1.0e-18, 3.0e-18])).unwrap();
        assert_eq!(mesh.nvoxels(), 2);
        assert_eq!(mesh.comp_voxels(CompId(0)), &[VoxelId(0), VoxelId(1)]);
        assert_eq!(mesh.comp_vol(CompId(0)), 4.0e-18);
        assert_eq!(mesh.voxel(VoxelId(0)).pools().len(), 1);
        assert_eq!(mesh.voxel(VoxelId(0)).neighbors()[1], Some(VoxelId(1)));
    }

    #[test]
    fn facets_take_their_patch_potential_and_index_their_voxels() {
        let sd = statedef(false);
        let mut spec = line_spec(&[1.0e-18, 1.0e-18]);
        let f = spec.add_facet(FacetDecl::new(PatchId(0), 2.0e-13, VoxelId(1)));
        let mesh = Mesh::build(&sd, &spec).unwrap();
        assert_eq!(mesh.facet(f).potential(), -0.07);
        assert_eq!(mesh.facet(f).pools().len(), 1);
        assert_eq!(mesh.patch_facets(PatchId(0)), &[f]);
        assert_eq!(mesh.patch_area(PatchId(0)), 2.0e-13);
        assert_eq!(mesh.voxel_facets(VoxelId(1)), &[f]);
        assert!(mesh.voxel_facets(VoxelId(0)).is_empty());
    }

    #[test]
    fn outer_voxels_land_in_the_reverse_index() {
        let sd = statedef(true);
        let mut spec = MeshSpec::new();
        let inner = spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        let outer = spec.add_voxel(VoxelDecl::new(CompId(1), 1.0e-18));
        let f = spec.add_facet(FacetDecl::new(PatchId(0), 1.0e-13, inner).outer(outer));
        let mesh = Mesh::build(&sd, &spec).unwrap();
        assert_eq!(mesh.voxel_facets(inner), &[f]);
        assert_eq!(mesh.voxel_facets(outer), &[f]);
        // Pools exist independently per element.
        assert_eq!(mesh.voxel(outer).count(LocalSpecId(0)), 0);
    }

    #[test]
    fn rejects_unknown_compartment() {
        let sd = statedef(false);
        let mut spec = MeshSpec::new();
        spec.add_voxel(VoxelDecl::new(CompId(7), 1.0e-18));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::UnknownCompartment { voxel: 0, comp: 7 })
        ));
    }

    #[test]
    fn rejects_nonpositive_volume() {
        let sd = statedef(false);
        let mut spec = MeshSpec::new();
        spec.add_voxel(VoxelDecl::new(CompId(0), 0.0));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::BadVolume { voxel: 0, .. })
        ));
    }

    #[test]
    fn rejects_self_neighbor() {
        let sd = statedef(false);
        let mut spec = MeshSpec::new();
        spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18).link(
            0,
            VoxelId(0),
            1.0e-6,
            1.0e-13,
        ));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::VoxelNeighborOutOfRange {
                voxel: 0,
                slot: 0,
                neighbor: 0,
            })
        ));
    }

    #[test]
    fn rejects_zero_distance_coupling() {
        let sd = statedef(false);
        let mut spec = MeshSpec::new();
        spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18).link(2, VoxelId(1), 0.0, 1.0e-13));
        spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::BadVoxelCoupling { voxel: 0, slot: 2 })
        ));
    }

    #[test]
    fn rejects_inner_compartment_mismatch() {
        let sd = statedef(true);
        let mut spec = MeshSpec::new();
        let wrong = spec.add_voxel(VoxelDecl::new(CompId(1), 1.0e-18));
        spec.add_facet(FacetDecl::new(PatchId(0), 1.0e-13, wrong));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::InnerCompartmentMismatch { facet: 0, .. })
        ));
    }

    #[test]
    fn rejects_missing_outer_voxel() {
        let sd = statedef(true);
        let mut spec = MeshSpec::new();
        let inner = spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        spec.add_facet(FacetDecl::new(PatchId(0), 1.0e-13, inner));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::MissingOuterVoxel { facet: 0, .. })
        ));
    }

    #[test]
    fn rejects_unexpected_outer_voxel() {
        let sd = statedef(false);
        let mut spec = MeshSpec::new();
        let inner = spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        let other = spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        spec.add_facet(FacetDecl::new(PatchId(0), 1.0e-13, inner).outer(other));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::UnexpectedOuterVoxel { facet: 0, .. })
        ));
    }

    #[test]
    fn rejects_facet_neighbor_outside_mesh() {
        let sd = statedef(false);
        let mut spec = MeshSpec::new();
        let inner = spec.add_voxel(VoxelDecl::new(CompId(0), 1.0e-18));
        spec.add_facet(FacetDecl::new(PatchId(0), 1.0e-13, inner).link(
            0,
            FacetId(9),
            1.0e-6,
            1.0e-6,
        ));
        assert!(matches!(
            Mesh::build(&sd, &spec),
            Err(MeshError::FacetNeighborOutOfRange {
                facet: 0,
                slot: 0,
                neighbor: 9,
            })
        ));
    }
}
