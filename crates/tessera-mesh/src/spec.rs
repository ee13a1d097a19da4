//! Plain-data mesh description, validated by [`Mesh::build`](crate::Mesh::build).

use tessera_core::{CompId, FacetId, PatchId, VoxelId};

/// One tetrahedral voxel: a compartment assignment, a volume, and up to
/// four directed adjacency slots.
///
/// A linked slot carries the center-to-center distance to the neighbor and
/// the cross-section area of the shared face, the two measurements a
/// diffusive hop rate needs. All lengths are in meters.
#[derive(Clone, Debug)]
pub struct VoxelDecl {
    /// Compartment this voxel belongs to.
    pub comp: CompId,
    /// Voxel volume in cubic meters.
    pub volume: f64,
    /// Neighbor voxel per face, `None` for boundary faces.
    pub neighbors: [Option<VoxelId>; 4],
    /// Center-to-center distance per linked face.
    pub distances: [f64; 4],
    /// Shared-face area per linked face.
    pub areas: [f64; 4],
}

impl VoxelDecl {
    /// A voxel with no adjacency.
    pub fn new(comp: CompId, volume: f64) -> Self {
        Self {
            comp,
            volume,
            neighbors: [None; 4],
            distances: [0.0; 4],
            areas: [0.0; 4],
        }
    }

    /// Link adjacency slot `slot` to `neighbor`.
    ///
    /// # Panics
    ///
    /// Panics when `slot` is 4 or larger.
    pub fn link(mut self, slot: usize, neighbor: VoxelId, distance: f64, area: f64) -> Self {
        self.neighbors[slot] = Some(neighbor);
        self.distances[slot] = distance;
        self.areas[slot] = area;
        self
    }
}

/// One triangular membrane facet: a patch assignment, an area, the voxels
/// on either side, and up to three directed adjacency slots for surface
/// diffusion.
///
/// A linked slot carries the center-to-center distance to the neighboring
/// facet and the length of the shared edge. The outer voxel is present
/// exactly when the owning patch declares an outer compartment.
#[derive(Clone, Debug)]
pub struct FacetDecl {
    /// Patch this facet belongs to.
    pub patch: PatchId,
    /// Facet area in square meters.
    pub area: f64,
    /// The voxel on the patch's inner side.
    pub inner: VoxelId,
    /// The voxel on the patch's outer side, if the patch has one.
    pub outer: Option<VoxelId>,
    /// Neighbor facet per edge, `None` for boundary edges.
    pub neighbors: [Option<FacetId>; 3],
    /// Center-to-center distance per linked edge.
    pub distances: [f64; 3],
    /// Shared-edge length per linked edge.
    pub lengths: [f64; 3],
}

impl FacetDecl {
    /// A facet with no outer voxel and no adjacency.
    pub fn new(patch: PatchId, area: f64, inner: VoxelId) -> Self {
        Self {
            patch,
            area,
            inner,
            outer: None,
            neighbors: [None; 3],
            distances: [0.0; 3],
            lengths: [0.0; 3],
        }
    }

    /// Set the outer-side voxel.
    pub fn outer(mut self, voxel: VoxelId) -> Self {
        self.outer = Some(voxel);
        self
    }

    /// Link adjacency slot `slot` to `neighbor`.
    ///
    /// # Panics
    ///
    /// Panics when `slot` is 3 or larger.
    pub fn link(mut self, slot: usize, neighbor: FacetId, distance: f64, length: f64) -> Self {
        self.neighbors[slot] = Some(neighbor);
        self.distances[slot] = distance;
        self.lengths[slot] = length;
        self
    }
}

/// The complete user-assembled mesh description.
#[derive(Clone, Debug, Default)]
pub struct MeshSpec {
    pub(crate) voxels: Vec<VoxelDecl>,
    pub(crate) facets: Vec<FacetDecl>,
}

impl MeshSpec {
    /// Create an empty mesh description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a voxel and return its id.
    pub fn add_voxel(&mut self, decl: VoxelDecl) -> VoxelId {
        self.voxels.push(decl);
        VoxelId(self.voxels.len() as u32 - 1)
    }

    /// Append a facet and return its id.
    pub fn add_facet(&mut self, decl: FacetDecl) -> FacetId {
        self.facets.push(decl);
        FacetId(self.facets.len() as u32 - 1)
    }

    /// Number of voxels declared so far.
    pub fn nvoxels(&self) -> u32 {
        self.voxels.len() as u32
    }

    /// Number of facets declared so far.
    pub fn nfacets(&self) -> u32 {
        self.facets.len() as u32
    }
}
