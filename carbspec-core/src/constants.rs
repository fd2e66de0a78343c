//! Thermodynamic and physical constants for the sodium/carbonate/water system.
//!
//! Equilibrium constants are thermodynamic (activity basis) values at 25 °C.
//! Temperature-adjusted values are derived in [`crate::equilibrium::EquilibriumConstants`].

/// First dissociation constant of carbonic acid at 25 °C.
pub const KA1_25C: f64 = 4.45e-7;

/// Second dissociation constant of carbonic acid at 25 °C.
pub const KA2_25C: f64 = 4.69e-11;

/// Water autoprotolysis constant at 25 °C.
pub const KW_25C: f64 = 1.0e-14;

/// Solubility product of NaHCO3(s) (Na+ · HCO3-).
pub const KSP_NAHCO3: f64 = 2.5e-8;

/// Solubility product of Na2CO3(s) (Na+² · CO3²-).
pub const KSP_NA2CO3: f64 = 1.0e-3;

/// Quadratic fit for pKa1 in °C: `a T² + b T + c`.
pub const PKA1_COEFFS: (f64, f64, f64) = (-1.333e-5, -0.008867, 6.58);

/// Quadratic fit for pKa2 in °C: `a T² + b T + c`.
pub const PKA2_COEFFS: (f64, f64, f64) = (-3.5238e-5, -0.010719, 10.62);

/// Linear fit for pKw in °C: `intercept + slope T`.
pub const PKW_COEFFS: (f64, f64) = (14.94, -0.0137);

/// Temperature range (°C) over which the pKa/pKw fits are evaluated.
/// Temperatures outside are clamped to the nearest bound.
pub const CONSTANT_FIT_RANGE_C: (f64, f64) = (-5.0, 80.0);

/// Upper ionic strength (mol/L) for which the Davies equation is used.
pub const DAVIES_LIMIT: f64 = 0.5;

/// Linear term coefficient of the Davies equation.
pub const DAVIES_COEFF: f64 = 0.3;

/// Default ionic strength cap (mol/L) for the capped Debye-Hückel model.
pub const ACTIVITY_EXTRAPOLATION_LIMIT: f64 = 2.5;

/// Pitzer `b` parameter (kg^1/2 mol^-1/2).
pub const PITZER_B: f64 = 1.2;

/// Pitzer `alpha1` used in the `B1` term.
pub const PITZER_ALPHA1: f64 = 2.0;

/// Density of water at 25 °C (g/mL), used to convert water mass to volume.
pub const WATER_DENSITY_25C_G_PER_ML: f64 = 0.9970474;

/// Molar mass of NaHCO3 (g/mol).
pub const MW_NAHCO3: f64 = 84.0066;

/// Molar mass of Na2CO3 (g/mol).
pub const MW_NA2CO3: f64 = 105.9888;

/// Molar mass of NaOH (g/mol).
pub const MW_NAOH: f64 = 39.997;
