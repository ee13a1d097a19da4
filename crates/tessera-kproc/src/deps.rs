//! Static firing-dependency analysis.
//!
//! After a process fires, only processes whose propensity reads a pool the
//! firing wrote need a rate refresh. Those sets are fixed for the life of a
//! simulation: stoichiometry is frozen at model compilation and every
//! process is bound to its mesh elements at construction. This module
//! derives the complete dependent table up front so the event loop can
//! propagate updates by table lookup instead of re-deriving read/write
//! overlap per event.

use tessera_core::{FacetId, KProcId, SpecId, SpecSet, VoxelId};
use tessera_mesh::Mesh;
use tessera_model::Statedef;

use crate::kproc::KProc;

/// One population-carrying mesh element.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ElemRef {
    Voxel(VoxelId),
    Facet(FacetId),
}

/// The pools one process touches, as (element, global species) pairs.
///
/// Reads cover everything the propensity depends on; writes cover every
/// species with a nonzero net change on firing.
struct Access {
    reads: Vec<(ElemRef, SpecSet)>,
    writes: Vec<(ElemRef, SpecSet)>,
}

fn spec_set<I: IntoIterator<Item = SpecId>>(specs: I) -> SpecSet {
    let mut set = SpecSet::new();
    for spec in specs {
        set.insert(spec);
    }
    set
}

fn upd_set(entries: &[(SpecId, i32)]) -> SpecSet {
    spec_set(entries.iter().map(|&(spec, _)| spec))
}

fn access_of(statedef: &Statedef, mesh: &Mesh, kproc: &KProc) -> Access {
    match kproc {
        KProc::Reac(k) => {
            let def = statedef.reac(k.reac());
            let host = ElemRef::Voxel(k.voxel());
            Access {
                reads: vec![(host, def.deps().clone())],
                writes: vec![(host, upd_set(def.upd()))],
            }
        }
        KProc::SReac(k) => {
            let def = statedef.sreac(k.sreac());
            let f = mesh.facet(k.facet());
            let surf = ElemRef::Facet(k.facet());
            let ivox = ElemRef::Voxel(f.inner());
            let mut reads = vec![(ivox, def.ideps().clone()), (surf, def.sdeps().clone())];
            let mut writes = vec![(ivox, upd_set(def.iupd())), (surf, upd_set(def.supd()))];
            if let Some(o) = f.outer() {
                let ovox = ElemRef::Voxel(o);
                reads.push((ovox, def.odeps().clone()));
                writes.push((ovox, upd_set(def.oupd())));
            }
            Access { reads, writes }
        }
        KProc::Diff(k) => {
            let lig = spec_set([statedef.diff(k.diff()).lig()]);
            Access {
                reads: vec![(ElemRef::Voxel(k.src()), lig.clone())],
                writes: vec![
                    (ElemRef::Voxel(k.src()), lig.clone()),
                    (ElemRef::Voxel(k.dst()), lig),
                ],
            }
        }
        KProc::SDiff(k) => {
            let lig = spec_set([statedef.sdiff(k.sdiff()).lig()]);
            Access {
                reads: vec![(ElemRef::Facet(k.src()), lig.clone())],
                writes: vec![
                    (ElemRef::Facet(k.src()), lig.clone()),
                    (ElemRef::Facet(k.dst()), lig),
                ],
            }
        }
        KProc::VDepTrans(k) => {
            let def = statedef.vdep_trans(k.trans());
            let surf = ElemRef::Facet(k.facet());
            Access {
                reads: vec![(surf, spec_set([def.src()]))],
                writes: vec![(surf, spec_set([def.src(), def.dst()]))],
            }
        }
    }
}

fn reads_overlap(acc: &Access, elem: ElemRef, written: &SpecSet) -> bool {
    acc.reads
        .iter()
        .any(|(e, deps)| *e == elem && written.intersects(deps))
}

/// Compute the dependent set for every process.
///
/// `deps[p]` lists every process whose propensity may change when process
/// `p` fires, ascending with no duplicates. Membership is decided from
/// declared stoichiometry alone, never from current activity or constants,
/// so run-time activity toggles and rate edits never invalidate the table.
///
/// Requires `kprocs[i].id() == KProcId(i)`, and every process already
/// registered on the element its propensity reads (host voxel for
/// reactions, source element for hops, host facet for surface processes).
/// Dependents of a write are searched among the processes registered on
/// the written element and, for voxels, on the facets bordering it, which
/// is where every possible reader of that element is registered.
pub fn setup_deps(statedef: &Statedef, mesh: &Mesh, kprocs: &[KProc]) -> Vec<Box<[KProcId]>> {
    let access: Vec<Access> = kprocs
        .iter()
        .map(|k| access_of(statedef, mesh, k))
        .collect();

    let mut table = Vec::with_capacity(kprocs.len());
    for acc in &access {
        let mut deps: Vec<KProcId> = Vec::new();
        for (elem, written) in &acc.writes {
            let mut consider = |kid: KProcId| {
                if reads_overlap(&access[kid.0 as usize], *elem, written) {
                    deps.push(kid);
                }
            };
            match *elem {
                ElemRef::Voxel(v) => {
                    for &kid in mesh.voxel(v).kprocs() {
                        consider(kid);
                    }
                    for &f in mesh.voxel_facets(v) {
                        for &kid in mesh.facet(f).kprocs() {
                            consider(kid);
                        }
                    }
                }
                ElemRef::Facet(f) => {
                    for &kid in mesh.facet(f).kprocs() {
                        consider(kid);
                    }
                }
            }
        }
        deps.sort_unstable();
        deps.dedup();
        table.push(deps.into_boxed_slice());
    }
    table
}
