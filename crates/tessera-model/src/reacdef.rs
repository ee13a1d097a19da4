//! Compiled volume reaction definitions.

use tessera_core::{ReacId, SpecId, SpecSet};

use crate::error::ModelError;
use crate::spec::ReacDecl;

/// Highest supported reactant order.
///
/// Propensities are falling-factorial products which are only meaningful
/// for small orders; elementary reactions above order 4 do not occur in
/// practice and are rejected at build time.
pub const MAX_ORDER: u32 = 4;

/// An immutable, compiled volume reaction.
///
/// Stoichiometry is stored sparsely in ascending species order: `lhs` for
/// the propensity computation, `upd` for the net population change on
/// firing. `kcst` here is the model's nominal default; runtime edits live
/// in the per-compartment constant tables, not on the definition.
#[derive(Clone, Debug)]
pub struct Reacdef {
    name: String,
    id: ReacId,
    order: u32,
    kcst: f64,
    lhs: Box<[(SpecId, u32)]>,
    upd: Box<[(SpecId, i32)]>,
    deps: SpecSet,
}

impl Reacdef {
    pub(crate) fn build(id: ReacId, decl: &ReacDecl, nspecs: u32) -> Result<Self, ModelError> {
        if !decl.kcst.is_finite() || decl.kcst < 0.0 {
            return Err(ModelError::BadConstant {
                kind: "reaction kcst",
                name: decl.name.clone(),
                value: decl.kcst,
            });
        }
        if decl.lhs.is_empty() && decl.rhs.is_empty() {
            return Err(ModelError::EmptyReaction {
                name: decl.name.clone(),
            });
        }

        let mut lhs_dense = vec![0u32; nspecs as usize];
        let mut net = vec![0i64; nspecs as usize];
        for &(spec, coeff) in &decl.lhs {
            check_entry(&decl.name, spec, coeff, nspecs)?;
            lhs_dense[spec.0 as usize] += coeff;
            net[spec.0 as usize] -= coeff as i64;
        }
        for &(spec, coeff) in &decl.rhs {
            check_entry(&decl.name, spec, coeff, nspecs)?;
            net[spec.0 as usize] += coeff as i64;
        }

        let order: u32 = lhs_dense.iter().sum();
        if order > MAX_ORDER {
            return Err(ModelError::OrderTooHigh {
                name: decl.name.clone(),
                order,
            });
        }

        let mut deps = SpecSet::new();
        let lhs: Vec<(SpecId, u32)> = lhs_dense
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

        Ok(Self {
            name: decl.name.clone(),
            id,
            order,
            kcst: decl.kcst,
            lhs: lhs.into_boxed_slice(),
            upd: upd.into_boxed_slice(),
            deps,
        })
    }

    /// The reaction's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reaction's global id.
    pub fn id(&self) -> ReacId {
        self.id
    }

    /// Total reactant order (sum of left-hand-side coefficients).
    pub fn order(&self) -> u32 {
        self.order
    }

    /// The nominal (model default) rate constant.
    pub fn kcst(&self) -> f64 {
        self.kcst
    }

    /// Reactants with coefficients, ascending by species id.
    pub fn lhs(&self) -> &[(SpecId, u32)] {
        &self.lhs
    }

    /// Net population change per firing, ascending by species id.
    pub fn upd(&self) -> &[(SpecId, i32)] {
        &self.upd
    }

    /// The species this reaction's propensity reads.
    pub fn deps(&self) -> &SpecSet {
        &self.deps
    }
}

pub(crate) fn check_entry(
    name: &str,
    spec: SpecId,
    coeff: u32,
    nspecs: u32,
) -> Result<(), ModelError> {
    if spec.0 >= nspecs {
        return Err(ModelError::UnknownId {
            kind: "species",
            index: spec.0,
        });
    }
    if coeff == 0 {
        return Err(ModelError::ZeroStoichiometry {
            name: name.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(lhs: Vec<(SpecId, u32)>, rhs: Vec<(SpecId, u32)>) -> ReacDecl {
        ReacDecl {
            name: "r".into(),
            lhs,
            rhs,
            kcst: 1.0,
        }
    }

    #[test]
    fn order_is_sum_of_lhs_coefficients() {
        let d = decl(vec![(SpecId(0), 2), (SpecId(1), 1)], vec![(SpecId(2), 1)]);
        let r = Reacdef::build(ReacId(0), &d, 3).unwrap();
        assert_eq!(r.order(), 3);
    }

    #[test]
    fn net_update_cancels_catalysts() {
        // E + S -> E + P: E appears on both sides and cancels.
        let d = decl(
            vec![(SpecId(0), 1), (SpecId(1), 1)],
            vec![(SpecId(0), 1), (SpecId(2), 1)],
        );
        let r = Reacdef::build(ReacId(0), &d, 3).unwrap();
        assert_eq!(r.upd(), &[(SpecId(1), -1), (SpecId(2), 1)]);
        assert!(r.deps().contains(SpecId(0)));
        assert!(r.deps().contains(SpecId(1)));
        assert!(!r.deps().contains(SpecId(2)));
    }

    #[test]
    fn doubled_reactant_folds_into_one_entry() {
        let d = ReacDecl {
            name: "dimerize".into(),
            lhs: vec![(SpecId(0), 1), (SpecId(0), 1)],
            rhs: vec![(SpecId(1), 1)],
            kcst: 2.0,
        };
        let r = Reacdef::build(ReacId(0), &d, 2).unwrap();
        assert_eq!(r.lhs(), &[(SpecId(0), 2)]);
        assert_eq!(r.order(), 2);
    }

    #[test]
    fn zero_order_creation_is_allowed() {
        let d = decl(vec![], vec![(SpecId(0), 1)]);
        let r = Reacdef::build(ReacId(0), &d, 1).unwrap();
        assert_eq!(r.order(), 0);
        assert!(r.deps().is_empty());
    }

    #[test]
    fn rejects_empty_reaction() {
        let d = decl(vec![], vec![]);
        assert!(matches!(
            Reacdef::build(ReacId(0), &d, 1),
            Err(ModelError::EmptyReaction { .. })
        ));
    }

    #[test]
    fn rejects_zero_coefficient() {
        let d = decl(vec![(SpecId(0), 0)], vec![(SpecId(1), 1)]);
        assert!(matches!(
            Reacdef::build(ReacId(0), &d, 2),
            Err(ModelError::ZeroStoichiometry { .. })
        ));
    }

    #[test]
    fn rejects_unknown_species() {
        let d = decl(vec![(SpecId(9), 1)], vec![]);
        assert!(matches!(
            Reacdef::build(ReacId(0), &d, 2),
            Err(ModelError::UnknownId { kind: "species", .. })
        ));
    }

    #[test]
    fn rejects_order_above_maximum() {
        let d = decl(vec![(SpecId(0), 3), (SpecId(1), 2)], vec![]);
        assert!(matches!(
            Reacdef::build(ReacId(0), &d, 2),
            Err(ModelError::OrderTooHigh { order: 5, .. })
        ));
    }

    #[test]
    fn rejects_negative_kcst() {
        let mut d = decl(vec![(SpecId(0), 1)], vec![]);
        d.kcst = -1.0;
        assert!(matches!(
            Reacdef::build(ReacId(0), &d, 1),
            Err(ModelError::BadConstant { .. })
        ));
    }
}
