//! Strongly-typed identifiers for model objects, mesh elements, and processes.
//!
//! Every index space in Tessera gets its own newtype so that a voxel index
//! can never be passed where a species index is expected. All identifiers
//! are dense: `SpecId(n)` is the n-th species registered in the model, and
//! likewise for every other kind.

use std::fmt;

/// Identifies a species in the global (model-wide) index space.
///
/// Compartments and patches each map a subset of the global species into
/// their own local index space; see [`LocalSpecId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId(pub u32);

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SpecId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a species within one compartment's or patch's local space.
///
/// Local indices are only meaningful relative to their owning container.
/// A species that exists globally but is absent from a container has no
/// local index there; lookups return `None`, which is a distinct
/// condition from a present species with count zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalSpecId(pub u32);

impl fmt::Display for LocalSpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LocalSpecId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a volume reaction definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReacId(pub u32);

impl fmt::Display for ReacId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ReacId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a surface reaction definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SReacId(pub u32);

impl fmt::Display for SReacId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SReacId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a volume diffusion rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiffId(pub u32);

impl fmt::Display for DiffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DiffId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a surface diffusion rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SDiffId(pub u32);

impl fmt::Display for SDiffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SDiffId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a voltage-dependent transition definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VDepTransId(pub u32);

impl fmt::Display for VDepTransId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VDepTransId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a compartment (a connected volume region of the mesh).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompId(pub u32);

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CompId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a patch (a surface region separating one or two compartments).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(pub u32);

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PatchId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a volume element (voxel) in the mesh arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelId(pub u32);

impl fmt::Display for VoxelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VoxelId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a surface element (facet) in the mesh arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FacetId(pub u32);

impl fmt::Display for FacetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FacetId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies one kinetic process instance in the solver's process arena.
///
/// KProc ids are assigned densely in construction order, which is fixed by
/// element index and definition order; the id therefore identifies the same
/// process across a checkpoint/restore cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KProcId(pub u32);

impl fmt::Display for KProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for KProcId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_bare_index() {
        assert_eq!(SpecId(7).to_string(), "7");
        assert_eq!(VoxelId(0).to_string(), "0");
        assert_eq!(KProcId(123).to_string(), "123");
    }

    #[test]
    fn ids_order_by_index() {
        assert!(SpecId(1) < SpecId(2));
        assert!(FacetId(10) > FacetId(9));
    }

    #[test]
    fn from_u32_roundtrip() {
        let id: CompId = 5u32.into();
        assert_eq!(id, CompId(5));
    }
}
