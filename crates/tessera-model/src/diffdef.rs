//! Compiled diffusion rule definitions.

use tessera_core::{DiffId, SDiffId, SpecId};

use crate::error::ModelError;
use crate::spec::{DiffDecl, SDiffDecl};

/// An immutable volume diffusion rule: one species, one diffusion constant.
///
/// The per-direction scaled constants are computed where the rule meets the
/// mesh, since they depend on each voxel pair's shared area, volume, and
/// separation.
#[derive(Clone, Debug)]
pub struct Diffdef {
    name: String,
    id: DiffId,
    lig: SpecId,
    dcst: f64,
}

impl Diffdef {
    pub(crate) fn build(id: DiffId, decl: &DiffDecl, nspecs: u32) -> Result<Self, ModelError> {
        if !decl.dcst.is_finite() || decl.dcst < 0.0 {
            return Err(ModelError::BadConstant {
                kind: "diffusion dcst",
                name: decl.name.clone(),
                value: decl.dcst,
            });
        }
        if decl.lig.0 >= nspecs {
            return Err(ModelError::UnknownId {
                kind: "species",
                index: decl.lig.0,
            });
        }
        Ok(Self {
            name: decl.name.clone(),
            id,
            lig: decl.lig,
            dcst: decl.dcst,
        })
    }

    /// The rule's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule's global id.
    pub fn id(&self) -> DiffId {
        self.id
    }

    /// The diffusing species.
    pub fn lig(&self) -> SpecId {
        self.lig
    }

    /// The nominal (model default) diffusion constant.
    pub fn dcst(&self) -> f64 {
        self.dcst
    }
}

/// An immutable surface diffusion rule, the facet-to-facet analogue of
/// [`Diffdef`].
#[derive(Clone, Debug)]
pub struct SurfDiffdef {
    name: String,
    id: SDiffId,
    lig: SpecId,
    dcst: f64,
}

impl SurfDiffdef {
    pub(crate) fn build(id: SDiffId, decl: &SDiffDecl, nspecs: u32) -> Result<Self, ModelError> {
        if !decl.dcst.is_finite() || decl.dcst < 0.0 {
            return Err(ModelError::BadConstant {
                kind: "surface diffusion dcst",
                name: decl.name.clone(),
                value: decl.dcst,
            });
        }
        if decl.lig.0 >= nspecs {
            return Err(ModelError::UnknownId {
                kind: "species",
                index: decl.lig.0,
            });
        }
        Ok(Self {
            name: decl.name.clone(),
            id,
            lig: decl.lig,
            dcst: decl.dcst,
        })
    }

    /// The rule's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule's global id.
    pub fn id(&self) -> SDiffId {
        self.id
    }

    /// The diffusing surface species.
    pub fn lig(&self) -> SpecId {
        self.lig
    }

    /// The nominal (model default) diffusion constant.
    pub fn dcst(&self) -> f64 {
        self.dcst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_dcst() {
        let d = DiffDecl {
            name: "d".into(),
            lig: SpecId(0),
            dcst: -1e-12,
        };
        assert!(matches!(
            Diffdef::build(DiffId(0), &d, 1),
            Err(ModelError::BadConstant { .. })
        ));
    }

    #[test]
    fn rejects_unknown_ligand() {
        let d = SDiffDecl {
            name: "sd".into(),
            lig: SpecId(3),
            dcst: 1e-12,
        };
        assert!(matches!(
            SurfDiffdef::build(SDiffId(0), &d, 2),
            Err(ModelError::UnknownId { .. })
        ));
    }

    #[test]
    fn zero_dcst_is_allowed() {
        let d = DiffDecl {
            name: "frozen".into(),
            lig: SpecId(0),
            dcst: 0.0,
        };
        assert_eq!(Diffdef::build(DiffId(0), &d, 1).unwrap().dcst(), 0.0);
    }
}
