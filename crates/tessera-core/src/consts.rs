//! Physical constants used in rate-constant scaling.

/// Avogadro's number, in molecules per mole.
pub const AVOGADRO: f64 = 6.02214179e23;
