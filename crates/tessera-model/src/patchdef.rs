//! Compiled patch definitions.

use tessera_core::{CompId, LocalSpecId, PatchId, SDiffId, SpecId, SReacId, VDepTransId};

/// A patch's compiled view of the model.
///
/// Mirrors [`Compdef`](crate::Compdef) for the membrane side of the system:
/// a dense local species space for facet pools, plus the surface reactions,
/// surface diffusion rules and voltage-dependent transitions anchored on
/// this patch. A patch always has an inner compartment; the outer one is
/// optional and `None` for membranes facing the outside of the mesh.
#[derive(Clone, Debug)]
pub struct Patchdef {
    name: String,
    id: PatchId,
    icomp: CompId,
    ocomp: Option<CompId>,
    init_potential: f64,
    g2l: Box<[Option<LocalSpecId>]>,
    l2g: Box<[SpecId]>,
    sreacs: Box<[SReacId]>,
    sdiffs: Box<[SDiffId]>,
    vdep_trans: Box<[VDepTransId]>,
    kcsts: Vec<f64>,
    dcsts: Vec<f64>,
    default_kcsts: Box<[f64]>,
    default_dcsts: Box<[f64]>,
}

impl Patchdef {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        id: PatchId,
        icomp: CompId,
        ocomp: Option<CompId>,
        init_potential: f64,
        species: &[SpecId],
        nspecs: u32,
        sreacs: Vec<SReacId>,
        sdiffs: Vec<SDiffId>,
        vdep_trans: Vec<VDepTransId>,
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
            icomp,
            ocomp,
            init_potential,
            g2l,
            l2g: l2g.into_boxed_slice(),
            sreacs: sreacs.into_boxed_slice(),
            sdiffs: sdiffs.into_boxed_slice(),
            vdep_trans: vdep_trans.into_boxed_slice(),
            kcsts,
            dcsts,
            default_kcsts,
            default_dcsts,
        }
    }

    /// The patch's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The patch's global id.
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// The inner compartment.
    pub fn icomp(&self) -> CompId {
        self.icomp
    }

    /// The outer compartment, if there is one.
    pub fn ocomp(&self) -> Option<CompId> {
        self.ocomp
    }

    /// Membrane potential applied to this patch's facets at setup, in volts.
    pub fn init_potential(&self) -> f64 {
        self.init_potential
    }

    /// Number of species that can occur on this patch.
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

    /// Surface reactions anchored on this patch.
    pub fn sreacs(&self) -> &[SReacId] {
        &self.sreacs
    }

    /// Surface diffusion rules anchored on this patch.
    pub fn sdiffs(&self) -> &[SDiffId] {
        &self.sdiffs
    }

    /// Voltage-dependent transitions anchored on this patch.
    pub fn vdep_trans(&self) -> &[VDepTransId] {
        &self.vdep_trans
    }

    /// Position of a surface reaction within [`sreacs`](Self::sreacs).
    pub fn sreac_pos(&self, sreac: SReacId) -> Option<usize> {
        self.sreacs.iter().position(|&r| r == sreac)
    }

    /// Position of a surface diffusion rule within [`sdiffs`](Self::sdiffs).
    pub fn sdiff_pos(&self, sdiff: SDiffId) -> Option<usize> {
        self.sdiffs.iter().position(|&d| d == sdiff)
    }

    /// Position of a transition within [`vdep_trans`](Self::vdep_trans).
    pub fn vdep_trans_pos(&self, trans: VDepTransId) -> Option<usize> {
        self.vdep_trans.iter().position(|&t| t == trans)
    }

    /// Current patch-default rate constant of the surface reaction at `pos`.
    pub fn kcst(&self, pos: usize) -> f64 {
        self.kcsts[pos]
    }

    /// Current patch-default diffusion constant of the rule at `pos`.
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

    fn patch() -> Patchdef {
        Patchdef::new(
            "memb".into(),
            PatchId(0),
            CompId(0),
            None,
            -0.065,
            &[SpecId(1), SpecId(3)],
            4,
            vec![SReacId(0), SReacId(2)],
            vec![SDiffId(1)],
            vec![VDepTransId(0)],
            vec![1e8, 5.0],
            vec![1e-13],
        )
    }

    #[test]
    fn species_maps_invert_each_other() {
        let p = patch();
        assert_eq!(p.nspecs(), 2);
        assert_eq!(p.g2l(SpecId(1)), Some(LocalSpecId(0)));
        assert_eq!(p.g2l(SpecId(3)), Some(LocalSpecId(1)));
        assert_eq!(p.g2l(SpecId(0)), None);
        assert_eq!(p.l2g(LocalSpecId(1)), SpecId(3));
    }

    #[test]
    fn positions_find_anchored_rules_only() {
        let p = patch();
        assert_eq!(p.sreac_pos(SReacId(2)), Some(1));
        assert_eq!(p.sreac_pos(SReacId(1)), None);
        assert_eq!(p.sdiff_pos(SDiffId(1)), Some(0));
        assert_eq!(p.vdep_trans_pos(VDepTransId(0)), Some(0));
    }

    #[test]
    fn constants_edit_and_reset() {
        let mut p = patch();
        p.set_kcst(1, 9.0);
        assert_eq!(p.kcst(1), 9.0);
        p.reset_constants();
        assert_eq!(p.kcst(1), 5.0);
        assert_eq!(p.init_potential(), -0.065);
    }
}
