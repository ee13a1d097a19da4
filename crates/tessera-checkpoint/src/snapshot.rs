//! The checkpoint data model and its binary layout.
//!
//! [`Snapshot`] is a plain in-memory image of one solver instant. The
//! solver lowers itself into this form to checkpoint and raises a decoded
//! form back into live state to restore; keeping the image inert means a
//! decode failure can never leave a half-written solver behind.

use std::io::{Read, Write};

use tessera_core::RngState;

use crate::codec::{
    read_bool, read_f64_le, read_i32_le, read_u128_le, read_u32_le, read_u64_le, read_u8,
    write_bool, write_f64_le, write_i32_le, write_u128_le, write_u32_le, write_u64_le, write_u8,
};
use crate::error::CheckpointError;
use crate::{FORMAT_VERSION, MAGIC};

/// Structural counts identifying the model and mesh a checkpoint fits.
///
/// Restore refuses a checkpoint whose fingerprint differs from the running
/// solver in any field; everything after the fingerprint is meaningless
/// against a different structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    /// Number of species definitions.
    pub nspecs: u32,
    /// Number of volume reaction definitions.
    pub nreacs: u32,
    /// Number of surface reaction definitions.
    pub nsreacs: u32,
    /// Number of volume diffusion rules.
    pub ndiffs: u32,
    /// Number of surface diffusion rules.
    pub nsdiffs: u32,
    /// Number of voltage-dependent transition definitions.
    pub nvdep_trans: u32,
    /// Number of compartments.
    pub ncomps: u32,
    /// Number of patches.
    pub npatches: u32,
    /// Number of voxels.
    pub nvoxels: u32,
    /// Number of facets.
    pub nfacets: u32,
}

/// Runtime-editable default constants of one compartment or patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RateTable {
    /// Reaction constants, in the container's anchored reaction order.
    pub kcsts: Vec<f64>,
    /// Diffusion constants, in the container's anchored rule order.
    pub dcsts: Vec<f64>,
}

/// Per-process counters and constants, uniform across process kinds.
///
/// Voltage transitions have no nominal constant; they store zeros here and
/// ignore them on restore.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KProcRecord {
    /// The nominal rate or diffusion constant.
    pub rate_const: f64,
    /// The geometry-scaled constant.
    pub ccst: f64,
    /// Times fired since the last reset.
    pub extent: u64,
    /// Whether the process competes for selection.
    pub active: bool,
}

/// State of one facet.
#[derive(Clone, Debug, PartialEq)]
pub struct FacetState {
    /// Membrane potential in volts.
    pub potential: f64,
    /// Population counts in patch-local species order.
    pub pools: Vec<u32>,
    /// Clamp flags, parallel to `pools`.
    pub clamped: Vec<bool>,
    /// Anchored process records, in anchor order.
    pub kprocs: Vec<KProcRecord>,
}

/// State of one voxel.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelState {
    /// Population counts in compartment-local species order.
    pub pools: Vec<u32>,
    /// Clamp flags, parallel to `pools`.
    pub clamped: Vec<bool>,
    /// Anchored process records, in anchor order.
    pub kprocs: Vec<KProcRecord>,
}

/// One scheduler bucket, exactly as the live structure holds it.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketState {
    /// The power-of-two exponent this bucket groups.
    pub exponent: i32,
    /// Raw process ids in live in-bucket order.
    pub members: Vec<u32>,
    /// The incrementally maintained member rate sum.
    pub sum: f64,
}

/// The scheduler's selection structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchedulerState {
    /// Buckets in live order.
    pub buckets: Vec<BucketState>,
    /// The incrementally maintained total rate.
    pub total: f64,
}

/// A complete, inert image of one solver instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Structural identity of the model and mesh.
    pub fingerprint: Fingerprint,
    /// Per-compartment default constants.
    pub comps: Vec<RateTable>,
    /// Per-patch default constants.
    pub patches: Vec<RateTable>,
    /// Per-facet state.
    pub facets: Vec<FacetState>,
    /// Per-voxel state.
    pub voxels: Vec<VoxelState>,
    /// The scheduler's exact bucket structure.
    pub scheduler: SchedulerState,
    /// The random source state.
    pub rng: RngState,
    /// Simulation time in seconds.
    pub time: f64,
    /// Events fired since the last reset.
    pub nsteps: u64,
}

impl Snapshot {
    /// Encode the snapshot into `w` in the fixed binary layout.
    pub fn encode(&self, w: &mut dyn Write) -> Result<(), CheckpointError> {
        debug_assert_eq!(self.comps.len(), self.fingerprint.ncomps as usize);
        debug_assert_eq!(self.patches.len(), self.fingerprint.npatches as usize);
        debug_assert_eq!(self.facets.len(), self.fingerprint.nfacets as usize);
        debug_assert_eq!(self.voxels.len(), self.fingerprint.nvoxels as usize);

        w.write_all(&MAGIC)?;
        write_u8(w, FORMAT_VERSION)?;
        encode_fingerprint(w, &self.fingerprint)?;

        for table in self.comps.iter().chain(self.patches.iter()) {
            encode_rate_table(w, table)?;
        }
        for facet in &self.facets {
            write_f64_le(w, facet.potential)?;
            encode_pools(w, &facet.pools, &facet.clamped)?;
            encode_records(w, &facet.kprocs)?;
        }
        for voxel in &self.voxels {
            encode_pools(w, &voxel.pools, &voxel.clamped)?;
            encode_records(w, &voxel.kprocs)?;
        }

        write_u32_le(w, self.scheduler.buckets.len() as u32)?;
        for bucket in &self.scheduler.buckets {
            write_i32_le(w, bucket.exponent)?;
            write_u32_le(w, bucket.members.len() as u32)?;
            for &member in &bucket.members {
                write_u32_le(w, member)?;
            }
            write_f64_le(w, bucket.sum)?;
        }
        write_f64_le(w, self.scheduler.total)?;

        w.write_all(&self.rng.seed)?;
        write_u64_le(w, self.rng.stream)?;
        write_u128_le(w, self.rng.word_pos)?;

        write_f64_le(w, self.time)?;
        write_u64_le(w, self.nsteps)?;
        Ok(())
    }

    /// Decode a snapshot from `r`, checking magic and version first.
    ///
    /// Structural errors only: the result still has to be validated
    /// against a live solver (fingerprint, table lengths, member ids)
    /// before being applied.
    pub fn decode(r: &mut dyn Read) -> Result<Self, CheckpointError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(CheckpointError::BadMagic);
        }
        let version = read_u8(r)?;
        if version != FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion { found: version });
        }

        let fingerprint = decode_fingerprint(r)?;
        let mut comps = Vec::with_capacity(fingerprint.ncomps as usize);
        for _ in 0..fingerprint.ncomps {
            comps.push(decode_rate_table(r)?);
        }
        let mut patches = Vec::with_capacity(fingerprint.npatches as usize);
        for _ in 0..fingerprint.npatches {
            patches.push(decode_rate_table(r)?);
        }
        let mut facets = Vec::with_capacity(fingerprint.nfacets as usize);
        for _ in 0..fingerprint.nfacets {
            let potential = read_f64_le(r)?;
            let (pools, clamped) = decode_pools(r)?;
            let kprocs = decode_records(r)?;
            facets.push(FacetState {
                potential,
                pools,
                clamped,
                kprocs,
            });
        }
        let mut voxels = Vec::with_capacity(fingerprint.nvoxels as usize);
        for _ in 0..fingerprint.nvoxels {
            let (pools, clamped) = decode_pools(r)?;
            let kprocs = decode_records(r)?;
            voxels.push(VoxelState {
                pools,
                clamped,
                kprocs,
            });
        }

        let nbuckets = read_u32_le(r)? as usize;
        let mut buckets = Vec::with_capacity(nbuckets);
        for _ in 0..nbuckets {
            let exponent = read_i32_le(r)?;
            let nmembers = read_u32_le(r)? as usize;
            let mut members = Vec::with_capacity(nmembers);
            for _ in 0..nmembers {
                members.push(read_u32_le(r)?);
            }
            let sum = read_f64_le(r)?;
            buckets.push(BucketState {
                exponent,
                members,
                sum,
            });
        }
        let total = read_f64_le(r)?;

        let mut seed = [0u8; 32];
        r.read_exact(&mut seed)?;
        let rng = RngState {
            seed,
            stream: read_u64_le(r)?,
            word_pos: read_u128_le(r)?,
        };

        let time = read_f64_le(r)?;
        let nsteps = read_u64_le(r)?;

        Ok(Self {
            fingerprint,
            comps,
            patches,
            facets,
            voxels,
            scheduler: SchedulerState { buckets, total },
            rng,
            time,
            nsteps,
        })
    }
}

fn encode_fingerprint(w: &mut dyn Write, fp: &Fingerprint) -> Result<(), CheckpointError> {
    for count in [
        fp.nspecs,
        fp.nreacs,
        fp.nsreacs,
        fp.ndiffs,
        fp.nsdiffs,
        fp.nvdep_trans,
        fp.ncomps,
        fp.npatches,
        fp.nvoxels,
        fp.nfacets,
    ] {
        write_u32_le(w, count)?;
    }
    Ok(())
}

fn decode_fingerprint(r: &mut dyn Read) -> Result<Fingerprint, CheckpointError> {
    Ok(Fingerprint {
        nspecs: read_u32_le(r)?,
        nreacs: read_u32_le(r)?,
        nsreacs: read_u32_le(r)?,
        ndiffs: read_u32_le(r)?,
        nsdiffs: read_u32_le(r)?,
        nvdep_trans: read_u32_le(r)?,
        ncomps: read_u32_le(r)?,
        npatches: read_u32_le(r)?,
        nvoxels: read_u32_le(r)?,
        nfacets: read_u32_le(r)?,
    })
}

fn encode_rate_table(w: &mut dyn Write, table: &RateTable) -> Result<(), CheckpointError> {
    write_u32_le(w, table.kcsts.len() as u32)?;
    for &k in &table.kcsts {
        write_f64_le(w, k)?;
    }
    write_u32_le(w, table.dcsts.len() as u32)?;
    for &d in &table.dcsts {
        write_f64_le(w, d)?;
    }
    Ok(())
}

fn decode_rate_table(r: &mut dyn Read) -> Result<RateTable, CheckpointError> {
    let nk = read_u32_le(r)? as usize;
    let mut kcsts = Vec::with_capacity(nk);
    for _ in 0..nk {
        kcsts.push(read_f64_le(r)?);
    }
    let nd = read_u32_le(r)? as usize;
    let mut dcsts = Vec::with_capacity(nd);
    for _ in 0..nd {
        dcsts.push(read_f64_le(r)?);
    }
    Ok(RateTable { kcsts, dcsts })
}

// One length prefix covers both vectors: clamp flags are always parallel
// to the pools they guard.
fn encode_pools(
    w: &mut dyn Write,
    pools: &[u32],
    clamped: &[bool],
) -> Result<(), CheckpointError> {
    debug_assert_eq!(pools.len(), clamped.len());
    write_u32_le(w, pools.len() as u32)?;
    for &count in pools {
        write_u32_le(w, count)?;
    }
    for &flag in clamped {
        write_bool(w, flag)?;
    }
    Ok(())
}

fn decode_pools(r: &mut dyn Read) -> Result<(Vec<u32>, Vec<bool>), CheckpointError> {
    let n = read_u32_le(r)? as usize;
    let mut pools = Vec::with_capacity(n);
    for _ in 0..n {
        pools.push(read_u32_le(r)?);
    }
    let mut clamped = Vec::with_capacity(n);
    for _ in 0..n {
        clamped.push(read_bool(r)?);
    }
    Ok((pools, clamped))
}

fn encode_records(w: &mut dyn Write, records: &[KProcRecord]) -> Result<(), CheckpointError> {
    write_u32_le(w, records.len() as u32)?;
    for rec in records {
        write_f64_le(w, rec.rate_const)?;
        write_f64_le(w, rec.ccst)?;
        write_u64_le(w, rec.extent)?;
        write_bool(w, rec.active)?;
    }
    Ok(())
}

fn decode_records(r: &mut dyn Read) -> Result<Vec<KProcRecord>, CheckpointError> {
    let n = read_u32_le(r)? as usize;
    let mut records = Vec::with_capacity(n);
    for _ in 0..n {
        records.push(KProcRecord {
            rate_const: read_f64_le(r)?,
            ccst: read_f64_le(r)?,
            extent: read_u64_le(r)?,
            active: read_bool(r)?,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> Snapshot {
        Snapshot {
            fingerprint: Fingerprint {
                nspecs: 3,
                nreacs: 2,
                nsreacs: 1,
                ndiffs: 1,
                nsdiffs: 0,
                nvdep_trans: 1,
                ncomps: 1,
                npatches: 1,
                nvoxels: 2,
                nfacets: 1,
            },
            comps: vec![RateTable {
                kcsts: vec![1.0e6, 0.25],
                dcsts: vec![1.5e-12],
            }],
            patches: vec![RateTable {
                kcsts: vec![3.0],
                dcsts: vec![],
            }],
            facets: vec![FacetState {
                potential: -0.065,
                pools: vec![4, 0],
                clamped: vec![false, true],
                kprocs: vec![
                    KProcRecord {
                        rate_const: 3.0,
                        ccst: 3.0,
                        extent: 12,
                        active: true,
                    },
                    KProcRecord {
                        rate_const: 0.0,
                        ccst: 0.0,
                        extent: 7,
                        active: false,
                    },
                ],
            }],
            voxels: vec![
                VoxelState {
                    pools: vec![100, 0, 3],
                    clamped: vec![false, false, false],
                    kprocs: vec![KProcRecord {
                        rate_const: 1.0e6,
                        ccst: 8.3e-16,
                        extent: 991,
                        active: true,
                    }],
                },
                VoxelState {
                    pools: vec![0, 0, 0],
                    clamped: vec![true, false, false],
                    kprocs: vec![],
                },
            ],
            scheduler: SchedulerState {
                buckets: vec![
                    BucketState {
                        exponent: -4,
                        members: vec![2, 0],
                        sum: 0.09375,
                    },
                    BucketState {
                        exponent: 10,
                        members: vec![1],
                        sum: 1536.0,
                    },
                ],
                total: 1536.09375,
            },
            rng: RngState {
                seed: [7u8; 32],
                stream: 1,
                word_pos: 123_456_789,
            },
            time: 0.03125,
            nsteps: 1010,
        }
    }

    fn encoded(s: &Snapshot) -> Vec<u8> {
        let mut buf = Vec::new();
        s.encode(&mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trip_preserves_everything() {
        let s = sample();
        let got = Snapshot::decode(&mut Cursor::new(encoded(&s))).unwrap();
        assert_eq!(got, s);
    }

    #[test]
    fn empty_sections_round_trip() {
        let mut s = sample();
        s.fingerprint.npatches = 0;
        s.fingerprint.nfacets = 0;
        s.patches.clear();
        s.facets.clear();
        let got = Snapshot::decode(&mut Cursor::new(encoded(&s))).unwrap();
        assert_eq!(got, s);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut buf = encoded(&sample());
        buf[0] = b'X';
        assert!(matches!(
            Snapshot::decode(&mut Cursor::new(buf)),
            Err(CheckpointError::BadMagic)
        ));
    }

    #[test]
    fn rejects_future_version() {
        let mut buf = encoded(&sample());
        buf[4] = FORMAT_VERSION + 1;
        assert!(matches!(
            Snapshot::decode(&mut Cursor::new(buf)),
            Err(CheckpointError::UnsupportedVersion { found }) if found == FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn missing_tail_is_truncation() {
        let mut buf = encoded(&sample());
        buf.pop();
        assert!(matches!(
            Snapshot::decode(&mut Cursor::new(buf)),
            Err(CheckpointError::Truncated)
        ));
    }

    #[test]
    fn potential_bits_survive_exactly() {
        let mut s = sample();
        s.facets[0].potential = f64::from_bits(0xbfb0_a3d7_0a3d_70a4);
        let got = Snapshot::decode(&mut Cursor::new(encoded(&s))).unwrap();
        assert_eq!(
            got.facets[0].potential.to_bits(),
            s.facets[0].potential.to_bits()
        );
    }
}
