//! Reusable model and mesh fixtures.
//!
//! Five standard systems sized for fast deterministic tests:
//!
//! - [`birth_death`]: zero-order creation plus first-order decay, the
//!   textbook process with a known stationary distribution.
//! - [`bimolecular`]: one association reaction, for second-order scaling.
//! - [`diffusion_line`]: a single species hopping along a voxel line.
//! - [`two_compartments`]: two fully independent subsystems in one mesh.
//! - [`membrane`]: surface binding, pump diffusion along the membrane,
//!   and a voltage-gated two-state channel.

use tessera_core::{CompId, FacetId, PatchId, VoxelId};
use tessera_mesh::{FacetDecl, Mesh, MeshSpec, VoxelDecl};
use tessera_model::{
    CompDecl, DiffDecl, ModelSpec, PatchDecl, ReacDecl, SDiffDecl, SReacDecl, Statedef,
    VDepTransDecl,
};

/// Volume of every fixture voxel, in m³ (a 100 nm cube).
pub const VOXEL_VOLUME: f64 = 1.0e-18;
/// Area of every fixture facet, in m².
pub const FACET_AREA: f64 = 1.0e-13;
/// Center-to-center distance of linked voxels and facets, in m.
pub const LINK_DISTANCE: f64 = 1.0e-6;
/// Contact area of linked voxels, in m².
pub const LINK_AREA: f64 = 1.0e-13;
/// Contact length of linked facets, in m.
pub const LINK_LENGTH: f64 = 1.0e-7;

/// Lower edge of the gate tables in [`membrane`], in volts.
pub const GATE_VMIN: f64 = -0.1;
/// Upper edge of the gate tables, in volts.
pub const GATE_VMAX: f64 = 0.1;
/// Grid step of the gate tables, in volts.
pub const GATE_DV: f64 = 0.01;

/// Binding constant of the membrane pump, in 1/(M·s).
pub const BIND_KCST: f64 = 1.0e8;
/// Release constant of the membrane pump, in 1/s.
pub const RELEASE_KCST: f64 = 5.0;
/// Surface diffusion constant of the free pump, in m²/s.
pub const PUMP_DCST: f64 = 1.0e-13;

/// Line mesh of `nvoxels` identical voxels in one compartment, linked
/// through slots 0 (previous) and 1 (next).
pub fn line_mesh(comp: CompId, nvoxels: u32) -> MeshSpec {
    let mut ms = MeshSpec::new();
    for i in 0..nvoxels {
        let mut decl = VoxelDecl::new(comp, VOXEL_VOLUME);
        if i > 0 {
            decl = decl.link(0, VoxelId(i - 1), LINK_DISTANCE, LINK_AREA);
        }
        if i + 1 < nvoxels {
            decl = decl.link(1, VoxelId(i + 1), LINK_DISTANCE, LINK_AREA);
        }
        ms.add_voxel(decl);
    }
    ms
}

/// Sample a rate function on the uniform grid a transition declaration
/// expects: `floor((vmax - vmin) / dv) + 1` points starting at `vmin`.
pub fn voltage_table(vmin: f64, vmax: f64, dv: f64, rate: impl Fn(f64) -> f64) -> Vec<f64> {
    let npoints = ((vmax - vmin) / dv).floor() as usize + 1;
    (0..npoints).map(|i| rate(vmin + i as f64 * dv)).collect()
}

/// Opening rate of the [`membrane`] gate, rising linearly with voltage.
pub fn gate_open_rate(v: f64) -> f64 {
    2.0 + 500.0 * (v - GATE_VMIN)
}

/// Closing rate of the [`membrane`] gate, falling linearly with voltage.
pub fn gate_close_rate(v: f64) -> f64 {
    2.0 + 500.0 * (GATE_VMAX - v)
}

/// Species `A` with creation at `birth_kcst` (per voxel) and decay at
/// `death_kcst` (per molecule), on a line of `nvoxels` voxels without
/// diffusion. Stationary mean per voxel: `birth / death` molecules.
pub fn birth_death(nvoxels: u32, birth_kcst: f64, death_kcst: f64) -> (Statedef, Mesh) {
    let mut m = ModelSpec::new();
    let a = m.add_species("A");
    let birth = m.add_reac(ReacDecl {
        name: "birth".into(),
        lhs: vec![],
        rhs: vec![(a, 1)],
        kcst: birth_kcst,
    });
    let death = m.add_reac(ReacDecl {
        name: "death".into(),
        lhs: vec![(a, 1)],
        rhs: vec![],
        kcst: death_kcst,
    });
    m.add_comp(CompDecl {
        name: "cyt".into(),
        reacs: vec![birth, death],
        ..Default::default()
    });
    let sd = Statedef::build(&m).expect("birth-death model is valid");
    let mesh = Mesh::build(&sd, &line_mesh(CompId(0), nvoxels)).expect("line mesh is valid");
    (sd, mesh)
}

/// `A + B -> C` at `kcst` in a single voxel.
pub fn bimolecular(kcst: f64) -> (Statedef, Mesh) {
    let mut m = ModelSpec::new();
    let a = m.add_species("A");
    let b = m.add_species("B");
    let c = m.add_species("C");
    let assoc = m.add_reac(ReacDecl {
        name: "assoc".into(),
        lhs: vec![(a, 1), (b, 1)],
        rhs: vec![(c, 1)],
        kcst,
    });
    m.add_comp(CompDecl {
        name: "cyt".into(),
        reacs: vec![assoc],
        ..Default::default()
    });
    let sd = Statedef::build(&m).expect("bimolecular model is valid");
    let mesh = Mesh::build(&sd, &line_mesh(CompId(0), 1)).expect("single voxel mesh is valid");
    (sd, mesh)
}

/// Species `A` diffusing at `dcst` along a line of `nvoxels` voxels, with
/// no reactions.
pub fn diffusion_line(nvoxels: u32, dcst: f64) -> (Statedef, Mesh) {
    let mut m = ModelSpec::new();
    let a = m.add_species("A");
    let da = m.add_diff(DiffDecl {
        name: "dA".into(),
        lig: a,
        dcst,
    });
    m.add_comp(CompDecl {
        name: "cyt".into(),
        diffs: vec![da],
        ..Default::default()
    });
    let sd = Statedef::build(&m).expect("diffusion model is valid");
    let mesh = Mesh::build(&sd, &line_mesh(CompId(0), nvoxels)).expect("line mesh is valid");
    (sd, mesh)
}

/// Two single-voxel compartments with disjoint species and reactions.
///
/// Compartment `left` hosts `A` with `birth_a`/`decay_a`, compartment
/// `right` hosts `B` with `birth_b`/`decay_b`; the voxels are not linked.
/// Nothing in one subsystem can read or write the other, which makes this
/// the reference system for dependency-isolation checks.
pub fn two_compartments() -> (Statedef, Mesh) {
    let mut m = ModelSpec::new();
    let a = m.add_species("A");
    let b = m.add_species("B");
    let birth_a = m.add_reac(ReacDecl {
        name: "birth_a".into(),
        lhs: vec![],
        rhs: vec![(a, 1)],
        kcst: 10.0,
    });
    let decay_a = m.add_reac(ReacDecl {
        name: "decay_a".into(),
        lhs: vec![(a, 1)],
        rhs: vec![],
        kcst: 1.0,
    });
    let birth_b = m.add_reac(ReacDecl {
        name: "birth_b".into(),
        lhs: vec![],
        rhs: vec![(b, 1)],
        kcst: 7.0,
    });
    let decay_b = m.add_reac(ReacDecl {
        name: "decay_b".into(),
        lhs: vec![(b, 1)],
        rhs: vec![],
        kcst: 0.5,
    });
    m.add_comp(CompDecl {
        name: "left".into(),
        reacs: vec![birth_a, decay_a],
        ..Default::default()
    });
    m.add_comp(CompDecl {
        name: "right".into(),
        reacs: vec![birth_b, decay_b],
        ..Default::default()
    });
    let sd = Statedef::build(&m).expect("two-compartment model is valid");
    let mut ms = MeshSpec::new();
    ms.add_voxel(VoxelDecl::new(CompId(0), VOXEL_VOLUME));
    ms.add_voxel(VoxelDecl::new(CompId(1), VOXEL_VOLUME));
    let mesh = Mesh::build(&sd, &ms).expect("two-voxel mesh is valid");
    (sd, mesh)
}

/// A cytosol line under a membrane patch with surface kinetics.
///
/// Volume species `A` binds a free surface pump `P` into a complex `PA`
/// ([`BIND_KCST`]) and is released again ([`RELEASE_KCST`]); `P` diffuses
/// along the membrane at [`PUMP_DCST`]. A two-state channel (`C`, `O`)
/// gates with voltage through the [`gate_open_rate`]/[`gate_close_rate`]
/// tables. One facet sits on each of the `nfacets` voxels, and facets are
/// linked in a line. Initial potential is -0.06 V.
pub fn membrane(nfacets: u32) -> (Statedef, Mesh) {
    let mut m = ModelSpec::new();
    let a = m.add_species("A");
    let p = m.add_species("P");
    let pa = m.add_species("PA");
    let closed = m.add_species("C");
    let open = m.add_species("O");

    let bind = m.add_sreac(SReacDecl {
        name: "bind".into(),
        ilhs: vec![(a, 1)],
        slhs: vec![(p, 1)],
        srhs: vec![(pa, 1)],
        kcst: BIND_KCST,
        ..Default::default()
    });
    let release = m.add_sreac(SReacDecl {
        name: "release".into(),
        slhs: vec![(pa, 1)],
        srhs: vec![(p, 1)],
        irhs: vec![(a, 1)],
        kcst: RELEASE_KCST,
        ..Default::default()
    });
    let dp = m.add_sdiff(SDiffDecl {
        name: "dP".into(),
        lig: p,
        dcst: PUMP_DCST,
    });
    let open_t = m.add_vdep_trans(VDepTransDecl {
        name: "open".into(),
        src: closed,
        dst: open,
        vmin: GATE_VMIN,
        vmax: GATE_VMAX,
        dv: GATE_DV,
        table: voltage_table(GATE_VMIN, GATE_VMAX, GATE_DV, gate_open_rate),
    });
    let close_t = m.add_vdep_trans(VDepTransDecl {
        name: "close".into(),
        src: open,
        dst: closed,
        vmin: GATE_VMIN,
        vmax: GATE_VMAX,
        dv: GATE_DV,
        table: voltage_table(GATE_VMIN, GATE_VMAX, GATE_DV, gate_close_rate),
    });

    m.add_comp(CompDecl {
        name: "cyt".into(),
        ..Default::default()
    });
    m.add_patch(PatchDecl {
        name: "memb".into(),
        icomp: CompId(0),
        ocomp: None,
        sreacs: vec![bind, release],
        sdiffs: vec![dp],
        vdeptrans: vec![open_t, close_t],
        species: vec![],
        init_potential: -0.06,
    });
    let sd = Statedef::build(&m).expect("membrane model is valid");

    let mut ms = line_mesh(CompId(0), nfacets);
    for i in 0..nfacets {
        let mut decl = FacetDecl::new(PatchId(0), FACET_AREA, VoxelId(i));
        if i > 0 {
            decl = decl.link(0, FacetId(i - 1), LINK_DISTANCE, LINK_LENGTH);
        }
        if i + 1 < nfacets {
            decl = decl.link(1, FacetId(i + 1), LINK_DISTANCE, LINK_LENGTH);
        }
        ms.add_facet(decl);
    }
    let mesh = Mesh::build(&sd, &ms).expect("membrane mesh is valid");
    (sd, mesh)
}
