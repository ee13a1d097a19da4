//! The closed kinetic-process enum and shared rate arithmetic.

use tessera_core::consts::AVOGADRO;
use tessera_core::{KProcId, LocalSpecId, SpecId};
use tessera_mesh::Mesh;
use tessera_model::Statedef;

use crate::diff::Diff;
use crate::reac::Reac;
use crate::sdiff::SDiff;
use crate::sreac::SReac;
use crate::vdeptrans::VDepTrans;

/// Whether a process participates in scheduling.
///
/// An inactive process reports rate zero and therefore never fires; its
/// population effects simply stop. Nothing else about it changes, so
/// reactivation picks up with current pools and constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    /// The process competes for selection.
    Active,
    /// The process reports rate zero.
    Inactive,
}

impl Activity {
    /// `true` for [`Activity::Active`].
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl From<bool> for Activity {
    fn from(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

/// One kinetic process, bound to its host element at construction.
#[derive(Clone, Debug)]
pub enum KProc {
    /// A volume reaction in one voxel.
    Reac(Reac),
    /// A surface reaction on one facet.
    SReac(SReac),
    /// A directed volume diffusion hop between two voxels.
    Diff(Diff),
    /// A directed surface diffusion hop between two facets.
    SDiff(SDiff),
    /// A voltage-dependent transition on one facet.
    VDepTrans(VDepTrans),
}

impl KProc {
    /// The process id.
    pub fn id(&self) -> KProcId {
        match self {
            Self::Reac(k) => k.id(),
            Self::SReac(k) => k.id(),
            Self::Diff(k) => k.id(),
            Self::SDiff(k) => k.id(),
            Self::VDepTrans(k) => k.id(),
        }
    }

    /// Current activity.
    pub fn activity(&self) -> Activity {
        match self {
            Self::Reac(k) => k.activity(),
            Self::SReac(k) => k.activity(),
            Self::Diff(k) => k.activity(),
            Self::SDiff(k) => k.activity(),
            Self::VDepTrans(k) => k.activity(),
        }
    }

    /// Set the activity.
    pub fn set_activity(&mut self, activity: Activity) {
        match self {
            Self::Reac(k) => k.set_activity(activity),
            Self::SReac(k) => k.set_activity(activity),
            Self::Diff(k) => k.set_activity(activity),
            Self::SDiff(k) => k.set_activity(activity),
            Self::VDepTrans(k) => k.set_activity(activity),
        }
    }

    /// Current propensity in events per second.
    ///
    /// Zero when inactive, when any reactant pool is short, or when the
    /// scaled constant is zero.
    pub fn rate(&self, statedef: &Statedef, mesh: &Mesh) -> f64 {
        match self {
            Self::Reac(k) => k.rate(mesh),
            Self::SReac(k) => k.rate(mesh),
            Self::Diff(k) => k.rate(mesh),
            Self::SDiff(k) => k.rate(mesh),
            Self::VDepTrans(k) => k.rate(statedef, mesh),
        }
    }

    /// Fire the process once: apply its population deltas and bump its
    /// extent counter.
    pub fn apply(&mut self, mesh: &mut Mesh) {
        match self {
            Self::Reac(k) => k.apply(mesh),
            Self::SReac(k) => k.apply(mesh),
            Self::Diff(k) => k.apply(mesh),
            Self::SDiff(k) => k.apply(mesh),
            Self::VDepTrans(k) => k.apply(mesh),
        }
    }

    /// The nominal (unscaled) rate or diffusion constant.
    ///
    /// Voltage transitions have no single constant and report zero.
    pub fn rate_const(&self) -> f64 {
        match self {
            Self::Reac(k) => k.kcst(),
            Self::SReac(k) => k.kcst(),
            Self::Diff(k) => k.dcst(),
            Self::SDiff(k) => k.dcst(),
            Self::VDepTrans(_) => 0.0,
        }
    }

    /// Replace the nominal constant and rescale the cached ccst.
    ///
    /// A no-op for voltage transitions, whose rates come from their table.
    pub fn set_rate_const(&mut self, value: f64) {
        match self {
            Self::Reac(k) => k.set_kcst(value),
            Self::SReac(k) => k.set_kcst(value),
            Self::Diff(k) => k.set_dcst(value),
            Self::SDiff(k) => k.set_dcst(value),
            Self::VDepTrans(_) => {}
        }
    }

    /// The scaled stochastic constant.
    ///
    /// Zero for voltage transitions.
    pub fn ccst(&self) -> f64 {
        match self {
            Self::Reac(k) => k.ccst(),
            Self::SReac(k) => k.ccst(),
            Self::Diff(k) => k.ccst(),
            Self::SDiff(k) => k.ccst(),
            Self::VDepTrans(_) => 0.0,
        }
    }

    /// How many times this process has fired.
    pub fn extent(&self) -> u64 {
        match self {
            Self::Reac(k) => k.extent(),
            Self::SReac(k) => k.extent(),
            Self::Diff(k) => k.extent(),
            Self::SDiff(k) => k.extent(),
            Self::VDepTrans(k) => k.extent(),
        }
    }

    /// Zero the extent counter.
    pub fn reset_extent(&mut self) {
        self.load_counters(0, self.activity());
    }

    /// Restore serialized bookkeeping: extent and activity.
    pub fn load_counters(&mut self, extent: u64, activity: Activity) {
        match self {
            Self::Reac(k) => k.load_counters(extent, activity),
            Self::SReac(k) => k.load_counters(extent, activity),
            Self::Diff(k) => k.load_counters(extent, activity),
            Self::SDiff(k) => k.load_counters(extent, activity),
            Self::VDepTrans(k) => k.load_counters(extent, activity),
        }
    }
}

/// Number of ordered ways to pick `k` distinct molecules from a pool of
/// `count`: `count · (count−1) · … · (count−k+1)`.
///
/// Hits an exact zero factor whenever `count < k`, which is what makes a
/// short pool force the whole propensity to zero.
pub(crate) fn falling_factorial(count: u32, k: u32) -> f64 {
    let n = i64::from(count);
    let mut acc = 1.0;
    for j in 0..i64::from(k) {
        acc *= (n - j) as f64;
        if acc == 0.0 {
            return 0.0;
        }
    }
    acc
}

/// Volumetric ccst scale: `(1e3 · volume · N_A)^-(order-1)`, with order 0
/// treated as order 1 so zero-order constants pass through unscaled.
pub(crate) fn volume_scale(volume: f64, order: u32) -> f64 {
    let vscale = 1.0e3 * volume * AVOGADRO;
    vscale.powi(-(order.max(1) as i32 - 1))
}

/// Areal ccst scale: `(area · N_A)^-(order-1)`, same order clamp.
pub(crate) fn area_scale(area: f64, order: u32) -> f64 {
    let ascale = area * AVOGADRO;
    ascale.powi(-(order.max(1) as i32 - 1))
}

/// Resolve a sparse global-species list into a container's local space.
///
/// Residency is closed over use at model compilation, so a missing local
/// slot here means the caller paired a definition with the wrong
/// container.
pub(crate) fn localize<C: Copy>(
    entries: &[(SpecId, C)],
    mut lookup: impl FnMut(SpecId) -> Option<LocalSpecId>,
) -> Box<[(LocalSpecId, C)]> {
    entries
        .iter()
        .map(|&(spec, coeff)| match lookup(spec) {
            Some(local) => (local, coeff),
            None => unreachable!("species {spec} not resident in host container"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn falling_factorial_matches_hand_values() {
        assert_eq!(falling_factorial(10, 0), 1.0);
        assert_eq!(falling_factorial(10, 1), 10.0);
        assert_eq!(falling_factorial(10, 2), 90.0);
        assert_eq!(falling_factorial(4, 4), 24.0);
    }

    #[test]
    fn short_pools_zero_out() {
        assert_eq!(falling_factorial(0, 1), 0.0);
        assert_eq!(falling_factorial(2, 3), 0.0);
        assert_eq!(falling_factorial(3, 4), 0.0);
    }

    #[test]
    fn scales_collapse_for_low_orders() {
        // Order 0 and 1 share the same (absent) scaling.
        assert_eq!(volume_scale(1.0e-18, 0), 1.0);
        assert_eq!(volume_scale(1.0e-18, 1), 1.0);
        assert_eq!(area_scale(1.0e-12, 1), 1.0);
    }

    #[test]
    fn second_order_scale_divides_once() {
        let vol = 1.0e-18;
        let expected = 1.0 / (1.0e3 * vol * AVOGADRO);
        assert_eq!(volume_scale(vol, 2), expected);
        let area = 1.0e-12;
        assert_eq!(area_scale(area, 2), 1.0 / (area * AVOGADRO));
    }

    proptest! {
        #[test]
        fn factorial_never_negative(count in 0u32..200, k in 0u32..5) {
            prop_assert!(falling_factorial(count, k) >= 0.0);
        }

        #[test]
        fn factorial_zero_iff_pool_short(count in 0u32..200, k in 1u32..5) {
            let zero = falling_factorial(count, k) == 0.0;
            prop_assert_eq!(zero, count < k);
        }
    }
}
