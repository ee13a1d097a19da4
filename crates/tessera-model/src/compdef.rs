//! Compiled compartment definitions.

use tessera_core::{CompId, DiffId, LocalSpecId, ReacId, SpecId};

/// A compartment's compiled view of the model: which species can live in
/// its voxels, and which volume reactions and diffusion rules run there.
///
/// Species indices come in two flavours. Global [`SpecId`]s index the whole
/// model's species table; local [`LocalSpecId`]s index this compartment's
/// dense per-voxel pools. The `g2l`/`l2g` maps translate between them, and
/// a `None` in `g2l` means the species cannot occur here at all.
#[derive(Clone, Debug)]
pub struct Compdef {
    name: String,
    id: CompId,
    g2l: Box<[Option<LocalSpecId>]>,
    l2g: Box<[SpecId]>,
    reacs: Box<[ReacId]>,
    diffs: Box<[DiffId]>,
    kcsts: Vec<f64>,
    dcsts: Vec<f64>,
    default_kcsts: Box<[f64]>,
    default_dcsts: Box<[f64]>,
}

impl Compdef {
    pub(crate) fn new(
        name: String,
        id: CompId,
        species: &[SpecId],
        nspecs: u32,
        reacs: Vec<ReacId>,
        diffs: Vec<DiffId>,
        kcsts: Vec<f64>,
        dcsts: Vec<f64>,
    ) -> Self {
        let mut g2l = vec![None; nspecs as usize].into_boxed_slice();
        let mut l2g = Vec::with_capacity(species.len());
        for (local, &spec) in species.iter().enumerate() {
            debug_assert!(g2l[spec.0 as usize].is_none());
            g2l[spec.0 as usize] = Some(LocalSpecId(local as u32));
            l2g.push(spec);
        }
        let default_kcsts = kcsts.clone().into_boxed_slice();
        let default_dcsts = dcsts.clone().into_boxed_slice();
        Self {
            name,
            id,
            g2l,
            l2g: l2g.into_boxed_slice(),
            reacs: reacs.into_boxed_slice(),
            diffs: diffs.into_boxed_slice(),
            kcsts,
            dcsts,
            default_kcsts,
            default_dcsts,
        }
    }

    /// The compartment's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compartment's global id.
    pub fn id(&self) -> CompId {
        self.id
    }

    /// Number of species that can occur in this compartment.
    pub fn nspecs(&self) -> u32 {
        self.l2g.len() as u32
    }

    /// Local index of a global species, or `None` if it cannot occur here.
    pub fn g2l(&self, spec: SpecId) -> Option<LocalSpecId> {
        self.g2l[spec.0 as usize]
    }

    /// Global id of a local species slot.
    pub fn l2g(&self, local: LocalSpecId) -> SpecId {
        self.l2g[local.0 as usize]
    }

    /// Volume reactions anchored in this compartment.
    pub fn reacs(&self) -> &[ReacId] {
        &self.reacs
    }

    /// Diffusion rules anchored in this compartment.
    pub fn diffs(&self) -> &[DiffId] {
        &self.diffs
    }

    /// Position of a reaction within [`reacs`](Self::reacs), if anchored here.
    pub fn reac_pos(&self, reac: ReacId) -> Option<usize> {
        self.reacs.iter().position(|&r| r == reac)
    }

    /// Position of a diffusion rule within [`diffs`](Self::diffs), if anchored here.
    pub fn diff_pos(&self, diff: DiffId) -> Option<usize> {
        self.diffs.iter().position(|&d| d == diff)
    }

    /// Current compartment-default rate constant of the reaction at `pos`.
    pub fn kcst(&self, pos: usize) -> f64 {
        self.kcsts[pos]
    }

    /// Current compartment-default diffusion constant of the rule at `pos`.
    pub fn dcst(&self, pos: usize) -> f64 {
        self.dcsts[pos]
    }

    pub(crate) fn set_kcst(&mut self, pos: usize, kcst: f64) {
        self.kcsts[pos] = kcst;
    }

    pub(crate) fn set_dcst(&mut self, pos: usize, dcst: f64) {
        self.dcsts[pos] = dcst;
    }

    pub(crate) fn reset_constants(&mut self) {
        self.kcsts.copy_from_slice(&self.default_kcsts);
        self.dcsts.copy_from_slice(&self.default_dcsts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp() -> Compdef {
        Compdef::new(
            "cyt".into(),
            CompId(0),
            &[SpecId(2), SpecId(0)],
            4,
            vec![ReacId(1), ReacId(3)],
            vec![DiffId(0)],
            vec![10.0, 20.0],
            vec![1e-12],
        )
    }

    #[test]
    fn species_maps_invert_each_other() {
        let c = comp();
        assert_eq!(c.nspecs(), 2);
        assert_eq!(c.g2l(SpecId(2)), Some(LocalSpecId(0)));
        assert_eq!(c.g2l(SpecId(0)), Some(LocalSpecId(1)));
        assert_eq!(c.g2l(SpecId(1)), None);
        assert_eq!(c.g2l(SpecId(3)), None);
        assert_eq!(c.l2g(LocalSpecId(0)), SpecId(2));
        assert_eq!(c.l2g(LocalSpecId(1)), SpecId(0));
    }

    #[test]
    fn positions_find_anchored_rules_only() {
        let c = comp();
        assert_eq!(c.reac_pos(ReacId(3)), Some(1));
        assert_eq!(c.reac_pos(ReacId(0)), None);
        assert_eq!(c.diff_pos(DiffId(0)), Some(0));
        assert_eq!(c.diff_pos(DiffId(2)), None);
    }

    #[test]
    fn constants_edit_and_reset() {
        let mut c = comp();
        c.set_kcst(0, 55.0);
        c.set_dcst(0, 2e-12);
        assert_eq!(c.kcst(0), 55.0);
        assert_eq!(c.kcst(1), 20.0);
        assert_eq!(c.dcst(0), 2e-12);
        c.reset_constants();
        assert_eq!(c.kcst(0), 10.0);
        assert_eq!(c.dcst(0), 1e-12);
    }
}
