//! Charge-balance residual and the bisection pH solve.
//!
//! The pH scale is activity based: `pH = -log10(γH [H+])`. At fixed activity coefficients
//! every species follows from [H+] through the conditional constants.

use super::constants::{ConditionalConstants, EquilibriumConstants};
use crate::species::{Species, SpeciesValues};
use log::trace;

/// The charge-balance problem at fixed ionic strength.
#[derive(Debug, Clone, Copy)]
pub struct ChargeBalance {
    pub conditional: ConditionalConstants,
    pub gamma_h: f64,
    /// Counter-ion concentration (mol/L).
    pub sodium_m: f64,
    /// Total dissolved inorganic carbon (mol/L).
    pub total_carbon_m: f64,
    /// Strong-acid (negative) or strong-base (positive) equivalents held in solution.
    pub titrant_m: f64,
}

impl ChargeBalance {
    pub fn new(
        constants: &EquilibriumConstants,
        gamma: &SpeciesValues,
        sodium_m: f64,
        total_carbon_m: f64,
    ) -> Self {
        Self {
            conditional: constants.conditional(gamma),
            gamma_h: gamma.get(Species::Hydrogen),
            sodium_m,
            total_carbon_m,
            titrant_m: 0.0,
        }
    }

    /// [H+] concentration at `ph`.
    pub fn hydrogen_at(&self, ph: f64) -> f64 {
        10f64.powf(-ph) / self.gamma_h
    }

    /// pH at a given [H+] concentration.
    pub fn ph_from_hydrogen(&self, hydrogen_m: f64) -> f64 {
        -(hydrogen_m * self.gamma_h).log10()
    }

    /// Species concentrations at a given [H+].
    pub fn species_from_hydrogen(&self, h: f64) -> SpeciesValues {
        let ConditionalConstants { k1, k2, kw } = self.conditional;
        let denominator = h * h + k1 * h + k1 * k2;

        let mut c = SpeciesValues::default();
        c[Species::Sodium] = self.sodium_m;
        c[Species::Hydrogen] = h;
        c[Species::Hydroxide] = kw / h;
        c[Species::CarbonicAcid] = self.total_carbon_m * h * h / denominator;
        c[Species::Bicarbonate] = self.total_carbon_m * k1 * h / denominator;
        c[Species::Carbonate] = self.total_carbon_m * k1 * k2 / denominator;
        c
    }

    pub fn species_at(&self, ph: f64) -> SpeciesValues {
        self.species_from_hydrogen(self.hydrogen_at(ph))
    }

    /// Net charge `Σ cations − Σ anions` (mol/L), including any titrant.
    ///
    /// Strictly decreasing in pH.
    pub fn residual(&self, ph: f64) -> f64 {
        self.species_at(ph).net_charge() + self.titrant_m
    }

    /// Charge magnitude `Σ c|z|` at `ph`, used to scale the acceptance tolerance.
    pub fn charge_magnitude(&self, ph: f64) -> f64 {
        self.species_at(ph).charge_magnitude() + self.titrant_m.abs()
    }
}

/// Outcome of a bisection run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bisection {
    Converged { ph: f64, iterations: usize },
    /// No sign change between the bracket ends.
    NoSignChange { f_low: f64, f_high: f64 },
    /// Iteration cap hit; `ph` is the midpoint of the last bracket.
    Exhausted { ph: f64, iterations: usize },
}

/// Bisect `f` over `[low, high]`.
///
/// Stops when `|f| < residual_tolerance` or the bracket is narrower than `ph_tolerance`.
pub fn bisect(
    f: impl Fn(f64) -> f64,
    (mut low, mut high): (f64, f64),
    ph_tolerance: f64,
    residual_tolerance: f64,
    max_iterations: usize,
) -> Bisection {
    let mut f_low = f(low);
    let f_high = f(high);
    if f_low.abs() < residual_tolerance {
        return Bisection::Converged {
            ph: low,
            iterations: 0,
        };
    }
    if f_high.abs() < residual_tolerance {
        return Bisection::Converged {
            ph: high,
            iterations: 0,
        };
    }
    if !(f_low.is_finite() && f_high.is_finite()) || f_low.signum() == f_high.signum() {
        return Bisection::NoSignChange { f_low, f_high };
    }

    for iteration in 1..=max_iterations {
        let mid = 0.5 * (low + high);
        let f_mid = f(mid);
        trace!("bisection {iteration}: pH={mid:.12} f={f_mid:.3e}");

        if f_mid.abs() < residual_tolerance || (high - low) < ph_tolerance {
            return Bisection::Converged {
                ph: mid,
                iterations: iteration,
            };
        }
        if f_mid.signum() == f_low.signum() {
            low = mid;
            f_low = f_mid;
        } else {
            high = mid;
        }
    }

    Bisection::Exhausted {
        ph: 0.5 * (low + high),
        iterations: max_iterations,
    }
}
