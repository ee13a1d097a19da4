//! Compilation of a [`ModelSpec`] into the immutable definition tables the
//! simulation layers work from.
//!
//! [`Statedef::build`] is the single validation gate: everything it accepts
//! is well formed by construction, so the solver and kinetic-process layers
//! index into its tables without further checking. Species membership is
//! closed over use. A species becomes resident in a compartment when it is
//! declared there, consumed or produced by an anchored reaction, carried by
//! an anchored diffusion rule, or touched from a bordering patch's surface
//! reactions; patch residency closes the same way over surface reactions,
//! surface diffusion and voltage transitions.

use indexmap::{IndexMap, IndexSet};

use tessera_core::{CompId, DiffId, PatchId, ReacId, SDiffId, SpecId, SReacId, VDepTransId};

use crate::compdef::Compdef;
use crate::diffdef::{Diffdef, SurfDiffdef};
use crate::error::ModelError;
use crate::patchdef::Patchdef;
use crate::reacdef::Reacdef;
use crate::spec::ModelSpec;
use crate::sreacdef::SReacdef;
use crate::vdeptransdef::VDepTransdef;

/// A registered chemical species.
#[derive(Clone, Debug)]
pub struct Specdef {
    name: String,
    id: SpecId,
}

impl Specdef {
    /// The species name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The species global id.
    pub fn id(&self) -> SpecId {
        self.id
    }
}

/// The compiled model: every definition table, fully validated.
///
/// Indexing methods take the ids this statedef itself issued; passing an id
/// from a different model is a logic error and panics.
#[derive(Clone, Debug)]
pub struct Statedef {
    specs: Box<[Specdef]>,
    reacs: Box<[Reacdef]>,
    sreacs: Box<[SReacdef]>,
    diffs: Box<[Diffdef]>,
    sdiffs: Box<[SurfDiffdef]>,
    vdep_trans: Box<[VDepTransdef]>,
    comps: Box<[Compdef]>,
    patches: Box<[Patchdef]>,
    spec_names: IndexMap<String, SpecId>,
    reac_names: IndexMap<String, ReacId>,
    sreac_names: IndexMap<String, SReacId>,
    diff_names: IndexMap<String, DiffId>,
    sdiff_names: IndexMap<String, SDiffId>,
    vdep_trans_names: IndexMap<String, VDepTransId>,
    comp_names: IndexMap<String, CompId>,
    patch_names: IndexMap<String, PatchId>,
}

impl Statedef {
    /// Compile a model description.
    ///
    /// Validates every declaration and resolves per-element species sets.
    /// On error nothing is constructed.
    pub fn build(spec: &ModelSpec) -> Result<Self, ModelError> {
        let nspecs = spec.species.len() as u32;

        let mut spec_names = IndexMap::with_capacity(spec.species.len());
        let mut specs = Vec::with_capacity(spec.species.len());
        for (i, name) in spec.species.iter().enumerate() {
            let id = SpecId(i as u32);
            if spec_names.insert(name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "species",
                    name: name.clone(),
                });
            }
            specs.push(Specdef {
                name: name.clone(),
                id,
            });
        }

        let mut reac_names = IndexMap::with_capacity(spec.reacs.len());
        let mut reacs = Vec::with_capacity(spec.reacs.len());
        for (i, decl) in spec.reacs.iter().enumerate() {
            let id = ReacId(i as u32);
            if reac_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "reaction",
                    name: decl.name.clone(),
                });
            }
            reacs.push(Reacdef::build(id, decl, nspecs)?);
        }

        let mut sreac_names = IndexMap::with_capacity(spec.sreacs.len());
        let mut sreacs = Vec::with_capacity(spec.sreacs.len());
        for (i, decl) in spec.sreacs.iter().enumerate() {
            let id = SReacId(i as u32);
            if sreac_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "surface reaction",
                    name: decl.name.clone(),
                });
            }
            sreacs.push(SReacdef::build(id, decl, nspecs)?);
        }

        let mut diff_names = IndexMap::with_capacity(spec.diffs.len());
        let mut diffs = Vec::with_capacity(spec.diffs.len());
        for (i, decl) in spec.diffs.iter().enumerate() {
            let id = DiffId(i as u32);
            if diff_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "diffusion rule",
                    name: decl.name.clone(),
                });
            }
            diffs.push(Diffdef::build(id, decl, nspecs)?);
        }

        let mut sdiff_names = IndexMap::with_capacity(spec.sdiffs.len());
        let mut sdiffs = Vec::with_capacity(spec.sdiffs.len());
        for (i, decl) in spec.sdiffs.iter().enumerate() {
            let id = SDiffId(i as u32);
            if sdiff_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "surface diffusion rule",
                    name: decl.name.clone(),
                });
            }
            sdiffs.push(SurfDiffdef::build(id, decl, nspecs)?);
        }

        let mut vdep_trans_names = IndexMap::with_capacity(spec.vdeptrans.len());
        let mut vdep_trans = Vec::with_capacity(spec.vdeptrans.len());
        for (i, decl) in spec.vdeptrans.iter().enumerate() {
            let id = VDepTransId(i as u32);
            if vdep_trans_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "voltage transition",
                    name: decl.name.clone(),
                });
            }
            vdep_trans.push(VDepTransdef::build(id, decl, nspecs)?);
        }

        // Pass 1 over compartments: check references, seed species sets.
        let mut comp_names = IndexMap::with_capacity(spec.comps.len());
        let mut comp_reacs: Vec<IndexSet<ReacId>> = Vec::with_capacity(spec.comps.len());
        let mut comp_diffs: Vec<IndexSet<DiffId>> = Vec::with_capacity(spec.comps.len());
        let mut comp_species: Vec<IndexSet<SpecId>> = Vec::with_capacity(spec.comps.len());
        for (i, decl) in spec.comps.iter().enumerate() {
            let id = CompId(i as u32);
            if comp_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "compartment",
                    name: decl.name.clone(),
                });
            }
            let mut species = IndexSet::new();
            for &s in &decl.species {
                if s.0 >= nspecs {
                    return Err(ModelError::UnknownId {
                        kind: "species",
                        index: s.0,
                    });
                }
                species.insert(s);
            }
            let mut rset = IndexSet::new();
            for &r in &decl.reacs {
                let def = reacs.get(r.0 as usize).ok_or(ModelError::UnknownId {
                    kind: "reaction",
                    index: r.0,
                })?;
                rset.insert(r);
                for &(s, _) in def.lhs() {
                    species.insert(s);
                }
                for &(s, _) in def.upd() {
                    species.insert(s);
                }
            }
            let mut dset = IndexSet::new();
            for &d in &decl.diffs {
                let def = diffs.get(d.0 as usize).ok_or(ModelError::UnknownId {
                    kind: "diffusion rule",
                    index: d.0,
                })?;
                dset.insert(d);
                species.insert(def.lig());
            }
            comp_reacs.push(rset);
            comp_diffs.push(dset);
            comp_species.push(species);
        }

        // Pass 1 over patches: check references, seed species sets, and
        // push volume-side surface-reaction species into the bordering
        // compartments.
        let ncomps = spec.comps.len() as u32;
        let mut patch_names = IndexMap::with_capacity(spec.patches.len());
        let mut patch_sreacs: Vec<IndexSet<SReacId>> = Vec::with_capacity(spec.patches.len());
        let mut patch_sdiffs: Vec<IndexSet<SDiffId>> = Vec::with_capacity(spec.patches.len());
        let mut patch_vdeps: Vec<IndexSet<VDepTransId>> = Vec::with_capacity(spec.patches.len());
        let mut patch_species: Vec<IndexSet<SpecId>> = Vec::with_capacity(spec.patches.len());
        for (i, decl) in spec.patches.iter().enumerate() {
            let id = PatchId(i as u32);
            if patch_names.insert(decl.name.clone(), id).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "patch",
                    name: decl.name.clone(),
                });
            }
            if decl.icomp.0 >= ncomps {
                return Err(ModelError::UnknownId {
                    kind: "compartment",
                    index: decl.icomp.0,
                });
            }
            if let Some(o) = decl.ocomp {
                if o.0 >= ncomps {
                    return Err(ModelError::UnknownId {
                        kind: "compartment",
                        index: o.0,
                    });
                }
            }
            if !decl.init_potential.is_finite() {
                return Err(ModelError::BadConstant {
                    kind: "initial potential",
                    name: decl.name.clone(),
                    value: decl.init_potential,
                });
            }
            let mut species = IndexSet::new();
            for &s in &decl.species {
                if s.0 >= nspecs {
                    return Err(ModelError::UnknownId {
                        kind: "species",
                        index: s.0,
                    });
                }
                species.insert(s);
            }
            let mut srset = IndexSet::new();
            for &sr in &decl.sreacs {
                let def = sreacs.get(sr.0 as usize).ok_or(ModelError::UnknownId {
                    kind: "surface reaction",
                    index: sr.0,
                })?;
                if def.touches_outer() && decl.ocomp.is_none() {
                    return Err(ModelError::OuterWithoutCompartment {
                        patch: decl.name.clone(),
                        sreac: def.name().to_owned(),
                    });
                }
                srset.insert(sr);
                for &(s, _) in def.slhs() {
                    species.insert(s);
                }
                for &(s, _) in def.supd() {
                    species.insert(s);
                }
                let icomp_species = &mut comp_species[decl.icomp.0 as usize];
                for &(s, _) in def.ilhs() {
                    icomp_species.insert(s);
                }
                for &(s, _) in def.iupd() {
                    icomp_species.insert(s);
                }
                if let Some(o) = decl.ocomp {
                    let ocomp_species = &mut comp_species[o.0 as usize];
                    for &(s, _) in def.olhs() {
                        ocomp_species.insert(s);
                    }
                    for &(s, _) in def.oupd() {
                        ocomp_species.insert(s);
                    }
                }
            }
            let mut sdset = IndexSet::new();
            for &sd in &decl.sdiffs {
                let def = sdiffs.get(sd.0 as usize).ok_or(ModelError::UnknownId {
                    kind: "surface diffusion rule",
                    index: sd.0,
                })?;
                sdset.insert(sd);
                species.insert(def.lig());
            }
            let mut vset = IndexSet::new();
            for &vt in &decl.vdeptrans {
                let def = vdep_trans.get(vt.0 as usize).ok_or(ModelError::UnknownId {
                    kind: "voltage transition",
                    index: vt.0,
                })?;
                if !def.in_range(decl.init_potential) {
                    return Err(ModelError::PotentialOutOfRange {
                        patch: decl.name.clone(),
                        transition: def.name().to_owned(),
                        potential: decl.init_potential,
                    });
                }
                vset.insert(vt);
                species.insert(def.src());
                species.insert(def.dst());
            }
            patch_sreacs.push(srset);
            patch_sdiffs.push(sdset);
            patch_vdeps.push(vset);
            patch_species.push(species);
        }

        // Pass 2: freeze the per-element tables. Local species slots go in
        // ascending global order so pool layouts do not depend on the order
        // declarations happened to arrive in.
        let mut comps = Vec::with_capacity(spec.comps.len());
        for (i, decl) in spec.comps.iter().enumerate() {
            let mut species: Vec<SpecId> = comp_species[i].iter().copied().collect();
            species.sort();
            let rset = &comp_reacs[i];
            let dset = &comp_diffs[i];
            let kcsts = rset.iter().map(|&r| reacs[r.0 as usize].kcst()).collect();
            let dcsts = dset.iter().map(|&d| diffs[d.0 as usize].dcst()).collect();
            comps.push(Compdef::new(
                decl.name.clone(),
                CompId(i as u32),
                &species,
                nspecs,
                rset.iter().copied().collect(),
                dset.iter().copied().collect(),
                kcsts,
                dcsts,
            ));
        }

        let mut patches = Vec::with_capacity(spec.patches.len());
        for (i, decl) in spec.patches.iter().enumerate() {
            let mut species: Vec<SpecId> = patch_species[i].iter().copied().collect();
            species.sort();
            let srset = &patch_sreacs[i];
            let sdset = &patch_sdiffs[i];
            let kcsts = srset
                .iter()
                .map(|&sr| sreacs[sr.0 as usize].kcst())
                .collect();
            let dcsts = sdset
                .iter()
                .map(|&sd| sdiffs[sd.0 as usize].dcst())
                .collect();
            patches.push(Patchdef::new(
                decl.name.clone(),
                PatchId(i as u32),
                decl.icomp,
                decl.ocomp,
                decl.init_potential,
                &species,
                nspecs,
                srset.iter().copied().collect(),
                sdset.iter().copied().collect(),
                patch_vdeps[i].iter().copied().collect(),
                kcsts,
                dcsts,
            ));
        }

        Ok(Self {
            specs: specs.into_boxed_slice(),
            reacs: reacs.into_boxed_slice(),
            sreacs: sreacs.into_boxed_slice(),
            diffs: diffs.into_boxed_slice(),
            sdiffs: sdiffs.into_boxed_slice(),
            vdep_trans: vdep_trans.into_boxed_slice(),
            comps: comps.into_boxed_slice(),
            patches: patches.into_boxed_slice(),
            spec_names,
            reac_names,
            sreac_names,
            diff_names,
            sdiff_names,
            vdep_trans_names,
            comp_names,
            patch_names,
        })
    }

    /// Number of registered species.
    pub fn nspecs(&self) -> u32 {
        self.specs.len() as u32
    }

    /// All species, in id order.
    pub fn specs(&self) -> &[Specdef] {
        &self.specs
    }

    /// Look up a species definition.
    pub fn spec(&self, id: SpecId) -> &Specdef {
        &self.specs[id.0 as usize]
    }

    /// All volume reactions, in id order.
    pub fn reacs(&self) -> &[Reacdef] {
        &self.reacs
    }

    /// Look up a volume reaction definition.
    pub fn reac(&self, id: ReacId) -> &Reacdef {
        &self.reacs[id.0 as usize]
    }

    /// All surface reactions, in id order.
    pub fn sreacs(&self) -> &[SReacdef] {
        &self.sreacs
    }

    /// Look up a surface reaction definition.
    pub fn sreac(&self, id: SReacId) -> &SReacdef {
        &self.sreacs[id.0 as usize]
    }

    /// All volume diffusion rules, in id order.
    pub fn diffs(&self) -> &[Diffdef] {
        &self.diffs
    }

    /// Look up a volume diffusion rule.
    pub fn diff(&self, id: DiffId) -> &Diffdef {
        &self.diffs[id.0 as usize]
    }

    /// All surface diffusion rules, in id order.
    pub fn sdiffs(&self) -> &[SurfDiffdef] {
        &self.sdiffs
    }

    /// Look up a surface diffusion rule.
    pub fn sdiff(&self, id: SDiffId) -> &SurfDiffdef {
        &self.sdiffs[id.0 as usize]
    }

    /// All voltage-dependent transitions, in id order.
    pub fn vdep_trans_all(&self) -> &[VDepTransdef] {
        &self.vdep_trans
    }

    /// Look up a voltage-dependent transition.
    pub fn vdep_trans(&self, id: VDepTransId) -> &VDepTransdef {
        &self.vdep_trans[id.0 as usize]
    }

    /// Number of compartments.
    pub fn ncomps(&self) -> u32 {
        self.comps.len() as u32
    }

    /// All compartments, in id order.
    pub fn comps(&self) -> &[Compdef] {
        &self.comps
    }

    /// Look up a compartment definition.
    pub fn comp(&self, id: CompId) -> &Compdef {
        &self.comps[id.0 as usize]
    }

    /// Number of patches.
    pub fn npatches(&self) -> u32 {
        self.patches.len() as u32
    }

    /// All patches, in id order.
    pub fn patches(&self) -> &[Patchdef] {
        &self.patches
    }

    /// Look up a patch definition.
    pub fn patch(&self, id: PatchId) -> &Patchdef {
        &self.patches[id.0 as usize]
    }

    /// Resolve a species by name.
    pub fn spec_by_name(&self, name: &str) -> Option<SpecId> {
        self.spec_names.get(name).copied()
    }

    /// Resolve a volume reaction by name.
    pub fn reac_by_name(&self, name: &str) -> Option<ReacId> {
        self.reac_names.get(name).copied()
    }

    /// Resolve a surface reaction by name.
    pub fn sreac_by_name(&self, name: &str) -> Option<SReacId> {
        self.sreac_names.get(name).copied()
    }

    /// Resolve a volume diffusion rule by name.
    pub fn diff_by_name(&self, name: &str) -> Option<DiffId> {
        self.diff_names.get(name).copied()
    }

    /// Resolve a surface diffusion rule by name.
    pub fn sdiff_by_name(&self, name: &str) -> Option<SDiffId> {
        self.sdiff_names.get(name).copied()
    }

    /// Resolve a voltage-dependent transition by name.
    pub fn vdep_trans_by_name(&self, name: &str) -> Option<VDepTransId> {
        self.vdep_trans_names.get(name).copied()
    }

    /// Resolve a compartment by name.
    pub fn comp_by_name(&self, name: &str) -> Option<CompId> {
        self.comp_names.get(name).copied()
    }

    /// Resolve a patch by name.
    pub fn patch_by_name(&self, name: &str) -> Option<PatchId> {
        self.patch_names.get(name).copied()
    }

    /// Overwrite the compartment-default rate constant of the reaction at
    /// `pos` in `comp`'s anchored list.
    pub fn set_comp_kcst(&mut self, comp: CompId, pos: usize, kcst: f64) {
        self.comps[comp.0 as usize].set_kcst(pos, kcst);
    }

    /// Overwrite the compartment-default diffusion constant of the rule at
    /// `pos` in `comp`'s anchored list.
    pub fn set_comp_dcst(&mut self, comp: CompId, pos: usize, dcst: f64) {
        self.comps[comp.0 as usize].set_dcst(pos, dcst);
    }

    /// Overwrite the patch-default rate constant of the surface reaction at
    /// `pos` in `patch`'s anchored list.
    pub fn set_patch_kcst(&mut self, patch: PatchId, pos: usize, kcst: f64) {
        self.patches[patch.0 as usize].set_kcst(pos, kcst);
    }

    /// Overwrite the patch-default diffusion constant of the rule at `pos`
    /// in `patch`'s anchored list.
    pub fn set_patch_dcst(&mut self, patch: PatchId, pos: usize, dcst: f64) {
        self.patches[patch.0 as usize].set_dcst(pos, dcst);
    }

    /// Restore every compartment and patch default constant to the value
    /// its declaration carried.
    pub fn reset_constants(&mut self) {
        for comp in self.comps.iter_mut() {
            comp.reset_constants();
        }
        for patch in self.patches.iter_mut() {
            patch.reset_constants();
        }
    }
}
