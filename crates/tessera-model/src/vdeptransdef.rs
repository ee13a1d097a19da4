//! Compiled voltage-dependent transition definitions.

use tessera_core::{SpecId, VDepTransId};

use crate::error::ModelError;
use crate::spec::VDepTransDecl;

/// An immutable voltage-dependent transition between two surface states.
///
/// The per-channel rate is tabulated on a uniform voltage grid over
/// `[vmin, vmax]` with step `dv`; queries interpolate linearly between the
/// two bracketing entries. The table is fixed at build time; there is no
/// runtime rate-constant editing for voltage transitions, the voltage
/// itself is the runtime input.
#[derive(Clone, Debug)]
pub struct VDepTransdef {
    name: String,
    id: VDepTransId,
    src: SpecId,
    dst: SpecId,
    vmin: f64,
    vmax: f64,
    dv: f64,
    table: Box<[f64]>,
}

impl VDepTransdef {
    pub(crate) fn build(
        id: VDepTransId,
        decl: &VDepTransDecl,
        nspecs: u32,
    ) -> Result<Self, ModelError> {
        for state in [decl.src, decl.dst] {
            if state.0 >= nspecs {
                return Err(ModelError::UnknownId {
                    kind: "species",
                    index: state.0,
                });
            }
        }
        if decl.src == decl.dst {
            return Err(ModelError::SelfTransition {
                name: decl.name.clone(),
            });
        }
        if !decl.vmin.is_finite()
            || !decl.vmax.is_finite()
            || !decl.dv.is_finite()
            || decl.dv <= 0.0
            || decl.vmin >= decl.vmax
        {
            return Err(ModelError::VoltageRange {
                name: decl.name.clone(),
            });
        }
        let expected = ((decl.vmax - decl.vmin) / decl.dv).floor() as usize + 1;
        if decl.table.len() != expected {
            return Err(ModelError::VoltageTableSize {
                name: decl.name.clone(),
                expected,
                found: decl.table.len(),
            });
        }
        for (i, &r) in decl.table.iter().enumerate() {
            if !r.is_finite() || r < 0.0 {
                return Err(ModelError::BadTableEntry {
                    name: decl.name.clone(),
                    index: i,
                });
            }
        }
        Ok(Self {
            name: decl.name.clone(),
            id,
            src: decl.src,
            dst: decl.dst,
            vmin: decl.vmin,
            vmax: decl.vmax,
            dv: decl.dv,
            table: decl.table.clone().into_boxed_slice(),
        })
    }

    /// The transition's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The transition's global id.
    pub fn id(&self) -> VDepTransId {
        self.id
    }

    /// The source state.
    pub fn src(&self) -> SpecId {
        self.src
    }

    /// The destination state.
    pub fn dst(&self) -> SpecId {
        self.dst
    }

    /// Lower edge of the tabulated range, in volts.
    pub fn vmin(&self) -> f64 {
        self.vmin
    }

    /// Upper edge of the tabulated range, in volts.
    pub fn vmax(&self) -> f64 {
        self.vmax
    }

    /// Whether a voltage lies inside the tabulated range.
    pub fn in_range(&self, v: f64) -> bool {
        v >= self.vmin && v <= self.vmax
    }

    /// Per-channel transition rate at the given voltage, in 1/s.
    ///
    /// Linear interpolation between the two bracketing grid entries; a
    /// query exactly on a grid point returns that entry. When the nominal
    /// range is not an integer number of steps, voltages past the last
    /// grid point extend flat from the final entry.
    ///
    /// # Panics
    ///
    /// Panics when `v` is outside `[vmin, vmax]`. Every path that feeds
    /// voltages into a simulation validates them against this range first,
    /// so an out-of-range query here is a caller logic defect, not a
    /// recoverable condition.
    pub fn rate_at(&self, v: f64) -> f64 {
        assert!(
            self.in_range(v),
            "voltage {} V outside the tabulated range [{}, {}] V of transition '{}'",
            v,
            self.vmin,
            self.vmax,
            self.name
        );
        let pos = (v - self.vmin) / self.dv;
        let lower = pos.floor();
        let frac = pos - lower;
        let li = lower as usize;
        let lo = self.table[li];
        if frac == 0.0 || li + 1 == self.table.len() {
            return lo;
        }
        let hi = self.table[li + 1];
        (1.0 - frac) * lo + frac * hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Grid chosen so every grid point is exactly representable.
    fn gate() -> VDepTransdef {
        let decl = VDepTransDecl {
            name: "gate".into(),
            src: SpecId(0),
            dst: SpecId(1),
            vmin: -1.0,
            vmax: 1.0,
            dv: 0.25,
            table: vec![0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0],
        };
        VDepTransdef::build(VDepTransId(0), &decl, 2).unwrap()
    }

    #[test]
    fn grid_points_return_entries_exactly() {
        let g = gate();
        assert_eq!(g.rate_at(-1.0), 0.0);
        assert_eq!(g.rate_at(-0.75), 1.0);
        assert_eq!(g.rate_at(0.0), 8.0);
        assert_eq!(g.rate_at(1.0), 128.0);
    }

    #[test]
    fn midpoints_return_arithmetic_mean() {
        let g = gate();
        assert_eq!(g.rate_at(-0.875), 0.5);
        assert_eq!(g.rate_at(0.125), 12.0);
    }

    #[test]
    #[should_panic(expected = "outside the tabulated range")]
    fn query_below_range_panics() {
        gate().rate_at(-1.01);
    }

    #[test]
    #[should_panic(expected = "outside the tabulated range")]
    fn query_above_range_panics() {
        gate().rate_at(1.5);
    }

    #[test]
    fn fractional_range_extends_flat_past_last_grid_point() {
        // (vmax - vmin) / dv = 2.5: grid points at 0.0, 0.4, 0.8; vmax 1.0.
        let decl = VDepTransDecl {
            name: "ragged".into(),
            src: SpecId(0),
            dst: SpecId(1),
            vmin: 0.0,
            vmax: 1.0,
            dv: 0.4,
            table: vec![1.0, 2.0, 3.0],
        };
        let g = VDepTransdef::build(VDepTransId(0), &decl, 2).unwrap();
        assert_eq!(g.rate_at(0.9), 3.0);
        assert_eq!(g.rate_at(1.0), 3.0);
    }

    #[test]
    fn rejects_wrong_table_size() {
        let decl = VDepTransDecl {
            name: "short".into(),
            src: SpecId(0),
            dst: SpecId(1),
            vmin: 0.0,
            vmax: 1.0,
            dv: 0.5,
            table: vec![1.0, 2.0],
        };
        assert!(matches!(
            VDepTransdef::build(VDepTransId(0), &decl, 2),
            Err(ModelError::VoltageTableSize {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn rejects_inverted_range() {
        let decl = VDepTransDecl {
            name: "inv".into(),
            src: SpecId(0),
            dst: SpecId(1),
            vmin: 1.0,
            vmax: -1.0,
            dv: 0.5,
            table: vec![],
        };
        assert!(matches!(
            VDepTransdef::build(VDepTransId(0), &decl, 2),
            Err(ModelError::VoltageRange { .. })
        ));
    }

    #[test]
    fn rejects_negative_table_entry() {
        let decl = VDepTransDecl {
            name: "neg".into(),
            src: SpecId(0),
            dst: SpecId(1),
            vmin: 0.0,
            vmax: 1.0,
            dv: 0.5,
            table: vec![1.0, -2.0, 3.0],
        };
        assert!(matches!(
            VDepTransdef::build(VDepTransId(0), &decl, 2),
            Err(ModelError::BadTableEntry { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_self_transition() {
        let decl = VDepTransDecl {
            name: "noop".into(),
            src: SpecId(0),
            dst: SpecId(0),
            vmin: 0.0,
            vmax: 1.0,
            dv: 0.5,
            table: vec![1.0, 1.0, 1.0],
        };
        assert!(matches!(
            VDepTransdef::build(VDepTransId(0), &decl, 2),
            Err(ModelError::SelfTransition { .. })
        ));
    }
}
