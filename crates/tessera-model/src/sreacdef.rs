//! Compiled surface reaction definitions.

use tessera_core::{SReacId, SpecId, SpecSet};

use crate::error::ModelError;
use crate::reacdef::{check_entry, MAX_ORDER};
use crate::spec::SReacDecl;

/// An immutable, compiled surface reaction.
///
/// Reactants and products are kept per side (inner volume, surface, outer
/// volume), each sparse and ascending by species id. The side that carries
/// volume reactants (at most one may) determines the rate-constant scaling:
/// a reaction with only surface reactants scales by the facet's area,
/// otherwise by the adjacent inner or outer voxel's volume.
#[derive(Clone, Debug)]
pub struct SReacdef {
    name: String,
    id: SReacId,
    order: u32,
    kcst: f64,
    ilhs: Box<[(SpecId, u32)]>,
    slhs: Box<[(SpecId, u32)]>,
    olhs: Box<[(SpecId, u32)]>,
    iupd: Box<[(SpecId, i32)]>,
    supd: Box<[(SpecId, i32)]>,
    oupd: Box<[(SpecId, i32)]>,
    ideps: SpecSet,
    sdeps: SpecSet,
    odeps: SpecSet,
}

impl SReacdef {
    pub(crate) fn build(id: SReacId, decl: &SReacDecl, nspecs: u32) -> Result<Self, ModelError> {
        if !decl.kcst.is_finite() || decl.kcst < 0.0 {
            return Err(ModelError::BadConstant {
                kind: "surface reaction kcst",
                name: decl.name.clone(),
                value: decl.kcst,
            });
        }
        let any_reactant =
            !(decl.ilhs.is_empty() && decl.slhs.is_empty() && decl.olhs.is_empty());
        let any_product = !(decl.irhs.is_empty() && decl.srhs.is_empty() && decl.orhs.is_empty());
        if !any_reactant && !any_product {
            return Err(ModelError::EmptyReaction {
                name: decl.name.clone(),
            });
        }
        if !decl.ilhs.is_empty() && !decl.olhs.is_empty() {
            return Err(ModelError::BothSidesVolume {
                name: decl.name.clone(),
            });
        }

        let (ilhs, iupd, ideps) = compile_side(&decl.name, &decl.ilhs, &decl.irhs, nspecs)?;
        let (slhs, supd, sdeps) = compile_side(&decl.name, &decl.slhs, &decl.srhs, nspecs)?;
        let (olhs, oupd, odeps) = compile_side(&decl.name, &decl.olhs, &decl.orhs, nspecs)?;

        let order: u32 = ilhs
            .iter()
            .chain(slhs.iter())
            .chain(olhs.iter())
            .map(|&(_, c)| c)
            .sum();
        if order > MAX_ORDER {
            return Err(ModelError::OrderTooHigh {
                name: decl.name.clone(),
                order,
            });
        }

        Ok(Self {
            name: decl.name.clone(),
            id,
            order,
            kcst: decl.kcst,
            ilhs: ilhs.into_boxed_slice(),
            slhs: slhs.into_boxed_slice(),
            olhs: olhs.into_boxed_slice(),
            iupd: iupd.into_boxed_slice(),
            supd: supd.into_boxed_slice(),
            oupd: oupd.into_boxed_slice(),
            ideps,
            sdeps,
            odeps,
        })
    }

    /// The surface reaction's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The surface reaction's global id.
    pub fn id(&self) -> SReacId {
        self.id
    }

    /// Total reactant order across all three sides.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// The nominal (model default) rate constant.
    pub fn kcst(&self) -> f64 {
        self.kcst
    }

    /// Whether all reactants live on the surface itself.
    pub fn surface_surface(&self) -> bool {
        self.ilhs.is_empty() && self.olhs.is_empty()
    }

    /// Whether the volume reactants (if any) live on the inner side.
    pub fn inner(&self) -> bool {
        !self.ilhs.is_empty()
    }

    /// Whether the reaction reads or writes the outer volume at all.
    pub fn touches_outer(&self) -> bool {
        !self.olhs.is_empty() || !self.oupd.is_empty()
    }

    /// Inner-volume reactants.
    pub fn ilhs(&self) -> &[(SpecId, u32)] {
        &self.ilhs
    }

    /// Surface reactants.
    pub fn slhs(&self) -> &[(SpecId, u32)] {
        &self.slhs
    }

    /// Outer-volume reactants.
    pub fn olhs(&self) -> &[(SpecId, u32)] {
        &self.olhs
    }

    /// Net inner-volume update per firing.
    pub fn iupd(&self) -> &[(SpecId, i32)] {
        &self.iupd
    }

    /// Net surface update per firing.
    pub fn supd(&self) -> &[(SpecId, i32)] {
        &self.supd
    }

    /// Net outer-volume update per firing.
    pub fn oupd(&self) -> &[(SpecId, i32)] {
        &self.oupd
    }

    /// Species read from the inner volume.
    pub fn ideps(&self) -> &SpecSet {
        &self.ideps
    }

    /// Species read from the surface.
    pub fn sdeps(&self) -> &SpecSet {
        &self.sdeps
    }

    /// Species read from the outer volume.
    pub fn odeps(&self) -> &SpecSet {
        &self.odeps
    }
}

type Side = (Vec<(SpecId, u32)>, Vec<(SpecId, i32)>, SpecSet);

fn compile_side(
    name: &str,
    lhs: &[(SpecId, u32)],
    rhs: &[(SpecId, u32)],
    nspecs: u32,
) -> Result<Side, ModelError> {
    let mut lhs_dense = vec![0u32; nspecs as usize];
    let mut net = vec![0i64; nspecs as usize];
    for &(spec, coeff) in lhs {
        check_entry(name, spec, coeff, nspecs)?;
        lhs_dense[spec.0 as usize] += coeff;
        net[spec.0 as usize] -= coeff as i64;
    }
    for &(spec, coeff) in rhs {
        check_entry(name, spec, coeff, nspecs)?;
        net[spec.0 as usize] += coeff as i64;
    }
    let mut deps = SpecSet::new();
    let lhs_sparse: Vec<(SpecId, u32)> = lhs_dense
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .map(|(g, &c)| {
            deps.insert(SpecId(g as u32));
            (SpecId(g as u32), c)
        })
        .collect();
    let upd: Vec<(SpecId, i32)> = net
        .iter()
        .enumerate()
        .filter(|(_, &d)| d != 0)
        .map(|(g, &d)| (SpecId(g as u32), d as i32))
        .collect();
    Ok((lhs_sparse, upd, deps))
}
