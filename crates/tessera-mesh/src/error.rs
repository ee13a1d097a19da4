//! Errors raised while compiling a mesh description.

use std::error::Error;
use std::fmt;

/// Errors from [`Mesh::build`](crate::Mesh::build).
///
/// Each variant pins the offending element by index so a generator that
/// produced the mesh can be debugged without bisecting the input.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshError {
    /// A voxel is assigned to a compartment the model does not define.
    UnknownCompartment {
        /// Index of the voxel.
        voxel: u32,
        /// The unregistered compartment index.
        comp: u32,
    },
    /// A facet is assigned to a patch the model does not define.
    UnknownPatch {
        /// Index of the facet.
        facet: u32,
        /// The unregistered patch index.
        patch: u32,
    },
    /// A voxel volume that is not finite and positive.
    BadVolume {
        /// Index of the voxel.
        voxel: u32,
        /// The rejected volume.
        volume: f64,
    },
    /// A facet area that is not finite and positive.
    BadArea {
        /// Index of the facet.
        facet: u32,
        /// The rejected area.
        area: f64,
    },
    /// A voxel adjacency slot points at a voxel index outside the mesh,
    /// or at the voxel itself.
    VoxelNeighborOutOfRange {
        /// Index of the voxel.
        voxel: u32,
        /// Adjacency slot (0..4).
        slot: usize,
        /// The rejected neighbor index.
        neighbor: u32,
    },
    /// A facet adjacency slot points at a facet index outside the mesh,
    /// or at the facet itself.
    FacetNeighborOutOfRange {
        /// Index of the facet.
        facet: u32,
        /// Adjacency slot (0..3).
        slot: usize,
        /// The rejected neighbor index.
        neighbor: u32,
    },
    /// A linked voxel adjacency slot carries a distance or cross-section
    /// area that is not finite and positive.
    BadVoxelCoupling {
        /// Index of the voxel.
        voxel: u32,
        /// Adjacency slot (0..4).
        slot: usize,
    },
    /// A linked facet adjacency slot carries a distance or shared-edge
    /// length that is not finite and positive.
    BadFacetCoupling {
        /// Index of the facet.
        facet: u32,
        /// Adjacency slot (0..3).
        slot: usize,
    },
    /// A facet references a voxel index outside the mesh.
    VoxelOutOfRange {
        /// Index of the facet.
        facet: u32,
        /// The rejected voxel index.
        voxel: u32,
    },
    /// A facet's inner voxel belongs to a different compartment than its
    /// patch's inner compartment.
    InnerCompartmentMismatch {
        /// Index of the facet.
        facet: u32,
        /// Name of the patch's inner compartment.
        expected: String,
        /// Name of the compartment the voxel actually belongs to.
        found: String,
    },
    /// A facet's outer voxel belongs to a different compartment than its
    /// patch's outer compartment.
    OuterCompartmentMismatch {
        /// Index of the facet.
        facet: u32,
        /// Name of the patch's outer compartment.
        expected: String,
        /// Name of the compartment the voxel actually belongs to.
        found: String,
    },
    /// A facet on a patch with an outer compartment declares no outer
    /// voxel.
    MissingOuterVoxel {
        /// Index of the facet.
        facet: u32,
        /// Name of the patch.
        patch: String,
    },
    /// A facet on a patch without an outer compartment declares an outer
    /// voxel.
    UnexpectedOuterVoxel {
        /// Index of the facet.
        facet: u32,
        /// Name of the patch.
        patch: String,
    },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCompartment { voxel, comp } => {
                write!(f, "voxel {voxel} references unknown compartment {comp}")
            }
            Self::UnknownPatch { facet, patch } => {
                write!(f, "facet {facet} references unknown patch {patch}")
            }
            Self::BadVolume { voxel, volume } => {
                write!(f, "voxel {voxel} volume must be finite and positive, got {volume}")
            }
            Self::BadArea { facet, area } => {
                write!(f, "facet {facet} area must be finite and positive, got {area}")
            }
            Self::VoxelNeighborOutOfRange {
                voxel,
                slot,
                neighbor,
            } => {
                write!(f, "voxel {voxel} slot {slot} links invalid neighbor {neighbor}")
            }
            Self::FacetNeighborOutOfRange {
                facet,
                slot,
                neighbor,
            } => {
                write!(f, "facet {facet} slot {slot} links invalid neighbor {neighbor}")
            }
            Self::BadVoxelCoupling { voxel, slot } => {
                write!(
                    f,
                    "voxel {voxel} slot {slot} needs a finite positive distance and area"
                )
            }
            Self::BadFacetCoupling { facet, slot } => {
                write!(
                    f,
                    "facet {facet} slot {slot} needs a finite positive distance and length"
                )
            }
            Self::VoxelOutOfRange { facet, voxel } => {
                write!(f, "facet {facet} references voxel {voxel} outside the mesh")
            }
            Self::InnerCompartmentMismatch {
                facet,
                expected,
                found,
            } => {
                write!(
                    f,
                    "facet {facet} inner voxel lies in compartment '{found}', \
                     its patch borders '{expected}'"
                )
            }
            Self::OuterCompartmentMismatch {
                facet,
                expected,
                found,
            } => {
                write!(
                    f,
                    "facet {facet} outer voxel lies in compartment '{found}', \
                     its patch borders '{expected}'"
                )
            }
            Self::MissingOuterVoxel { facet, patch } => {
                write!(
                    f,
                    "facet {facet} on patch '{patch}' must declare an outer voxel"
                )
            }
            Self::UnexpectedOuterVoxel { facet, patch } => {
                write!(
                    f,
                    "facet {facet} on patch '{patch}' declares an outer voxel, \
                     but the patch has no outer compartment"
                )
            }
        }
    }
}

impl Error for MeshError {}
