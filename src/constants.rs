//! Physical constants used throughout the transport kernel, in CGS units.

/// Speed of light, cm/s.
pub const C: f64 = 2.999_792_458e10;

/// Thomson electron-scattering cross-section, cm².
pub const SIGMA_THOMSON: f64 = 6.652_486e-25;

/// Sentinel distance used to represent "no intersection" in [`crate::geometry`].
pub const MISS_DISTANCE: f64 = 1e99;

/// Relative frequency separation below which two lines are treated as "close" (§`CloseLine`).
pub const CLOSE_LINE_THRESHOLD: f64 = 1e-7;
