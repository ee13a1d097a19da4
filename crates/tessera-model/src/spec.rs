//! User-assembled model description.
//!
//! A [`ModelSpec`] is plain data: registration methods hand back typed ids,
//! and nothing is validated until [`Statedef::build`](crate::Statedef::build)
//! compiles the whole description at once. Stoichiometry is written as
//! `(species, coefficient)` pairs; a species may appear on both sides of a
//! reaction (catalysts), and the compiled net update cancels accordingly.

use tessera_core::{CompId, DiffId, PatchId, ReacId, SDiffId, SReacId, SpecId, VDepTransId};

/// A volume reaction declaration.
#[derive(Clone, Debug)]
pub struct ReacDecl {
    /// Unique reaction name.
    pub name: String,
    /// Reactant species and their stoichiometric coefficients.
    pub lhs: Vec<(SpecId, u32)>,
    /// Product species and their stoichiometric coefficients.
    pub rhs: Vec<(SpecId, u32)>,
    /// Nominal rate constant in SI concentration units for the reaction's
    /// order (e.g. 1/s for first order, 1/(M·s) for second order).
    pub kcst: f64,
}

/// A surface reaction declaration.
///
/// Reactants and products are split by where they live: the inner volume
/// (`i`), the surface itself (`s`), or the outer volume (`o`). A surface
/// reaction may take volume reactants from at most one side.
#[derive(Clone, Debug, Default)]
pub struct SReacDecl {
    /// Unique surface reaction name.
    pub name: String,
    /// Inner-volume reactants.
    pub ilhs: Vec<(SpecId, u32)>,
    /// Surface reactants.
    pub slhs: Vec<(SpecId, u32)>,
    /// Outer-volume reactants.
    pub olhs: Vec<(SpecId, u32)>,
    /// Inner-volume products.
    pub irhs: Vec<(SpecId, u32)>,
    /// Surface products.
    pub srhs: Vec<(SpecId, u32)>,
    /// Outer-volume products.
    pub orhs: Vec<(SpecId, u32)>,
    /// Nominal rate constant.
    pub kcst: f64,
}

/// A volume diffusion rule declaration.
#[derive(Clone, Debug)]
pub struct DiffDecl {
    /// Unique rule name.
    pub name: String,
    /// The diffusing species.
    pub lig: SpecId,
    /// Diffusion constant in m²/s.
    pub dcst: f64,
}

/// A surface diffusion rule declaration.
#[derive(Clone, Debug)]
pub struct SDiffDecl {
    /// Unique rule name.
    pub name: String,
    /// The diffusing surface species.
    pub lig: SpecId,
    /// Diffusion constant in m²/s.
    pub dcst: f64,
}

/// A voltage-dependent transition declaration.
///
/// The transition converts one surface state into another at a rate read
/// from a table sampled uniformly over `[vmin, vmax]` with step `dv`; the
/// table must hold exactly `floor((vmax - vmin) / dv) + 1` entries.
#[derive(Clone, Debug)]
pub struct VDepTransDecl {
    /// Unique transition name.
    pub name: String,
    /// Source state (a surface species).
    pub src: SpecId,
    /// Destination state (a surface species).
    pub dst: SpecId,
    /// Lower edge of the tabulated voltage range, in volts.
    pub vmin: f64,
    /// Upper edge of the tabulated voltage range, in volts.
    pub vmax: f64,
    /// Table step, in volts.
    pub dv: f64,
    /// Per-channel transition rates (1/s), one entry per grid point.
    pub table: Vec<f64>,
}

/// A compartment declaration.
///
/// The compartment's species space is the union of `species` and every
/// species referenced by its reactions and diffusion rules (and by surface
/// reactions of attached patches); listing species explicitly is only
/// needed for species touched by nothing but setters.
#[derive(Clone, Debug, Default)]
pub struct CompDecl {
    /// Unique compartment name.
    pub name: String,
    /// Reactions hosted in this compartment.
    pub reacs: Vec<ReacId>,
    /// Diffusion rules active in this compartment.
    pub diffs: Vec<DiffId>,
    /// Additional species carried by this compartment.
    pub species: Vec<SpecId>,
}

/// A patch declaration.
#[derive(Clone, Debug)]
pub struct PatchDecl {
    /// Unique patch name.
    pub name: String,
    /// The compartment on the patch's inner side.
    pub icomp: CompId,
    /// The compartment on the outer side, if any.
    pub ocomp: Option<CompId>,
    /// Surface reactions hosted on this patch.
    pub sreacs: Vec<SReacId>,
    /// Surface diffusion rules active on this patch.
    pub sdiffs: Vec<SDiffId>,
    /// Voltage-dependent transitions hosted on this patch.
    pub vdeptrans: Vec<VDepTransId>,
    /// Additional surface species carried by this patch.
    pub species: Vec<SpecId>,
    /// Initial membrane potential of the patch's facets, in volts.
    ///
    /// Must lie inside the voltage range of every attached transition;
    /// irrelevant (conventionally zero) when the patch hosts none.
    pub init_potential: f64,
}

/// The complete user-assembled model description.
#[derive(Clone, Debug, Default)]
pub struct ModelSpec {
    pub(crate) species: Vec<String>,
    pub(crate) reacs: Vec<ReacDecl>,
    pub(crate) sreacs: Vec<SReacDecl>,
    pub(crate) diffs: Vec<DiffDecl>,
    pub(crate) sdiffs: Vec<SDiffDecl>,
    pub(crate) vdeptrans: Vec<VDepTransDecl>,
    pub(crate) comps: Vec<CompDecl>,
    pub(crate) patches: Vec<PatchDecl>,
}

impl ModelSpec {
    /// Create an empty model description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a species and return its global id.
    pub fn add_species(&mut self, name: &str) -> SpecId {
        self.species.push(name.to_owned());
        SpecId(self.species.len() as u32 - 1)
    }

    /// Register a volume reaction.
    pub fn add_reac(&mut self, decl: ReacDecl) -> ReacId {
        self.reacs.push(decl);
        ReacId(self.reacs.len() as u32 - 1)
    }

    /// Register a surface reaction.
    pub fn add_sreac(&mut self, decl: SReacDecl) -> SReacId {
        self.sreacs.push(decl);
        SReacId(self.sreacs.len() as u32 - 1)
    }

    /// Register a volume diffusion rule.
    pub fn add_diff(&mut self, decl: DiffDecl) -> DiffId {
        self.diffs.push(decl);
        DiffId(self.diffs.len() as u32 - 1)
    }

    /// Register a surface diffusion rule.
    pub fn add_sdiff(&mut self, decl: SDiffDecl) -> SDiffId {
        self.sdiffs.push(decl);
        SDiffId(self.sdiffs.len() as u32 - 1)
    }

    /// Register a voltage-dependent transition.
    pub fn add_vdep_trans(&mut self, decl: VDepTransDecl) -> VDepTransId {
        self.vdeptrans.push(decl);
        VDepTransId(self.vdeptrans.len() as u32 - 1)
    }

    /// Register a compartment.
    pub fn add_comp(&mut self, decl: CompDecl) -> CompId {
        self.comps.push(decl);
        CompId(self.comps.len() as u32 - 1)
    }

    /// Register a patch.
    pub fn add_patch(&mut self, decl: PatchDecl) -> PatchId {
        self.patches.push(decl);
        PatchId(self.patches.len() as u32 - 1)
    }
}
