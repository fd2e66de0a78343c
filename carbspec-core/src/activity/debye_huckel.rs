//! Debye-Hückel family of activity corrections.
//!
//! These depend only on ionic strength, charge and ion size, never on the
//! detailed composition.

use crate::constants::{DAVIES_COEFF, DAVIES_LIMIT};
use crate::species::{Species, SpeciesValues};

/// Debye-Hückel `A` parameter (L^1/2 mol^-1/2) at `temperature_c`.
///
/// Linear fit over 0–100 °C; 0.509 at 25 °C.
pub fn debye_a(temperature_c: f64) -> f64 {
    let t = temperature_c.clamp(0.0, 100.0);
    0.4883 + 8.074e-4 * t
}

/// Debye-Hückel `B` parameter (Å^-1 L^1/2 mol^-1/2) at `temperature_c`.
///
/// 0.328 at 25 °C.
pub fn debye_b(temperature_c: f64) -> f64 {
    let t = temperature_c.clamp(0.0, 100.0);
    0.3241 + 1.6e-4 * t
}

/// Extended Debye-Hückel:
///
/// $$ \log_{10} \gamma_i = -\frac{A z_i^2 \sqrt{I}}{1 + B a_i \sqrt{I}} $$
pub fn extended(ionic_strength: f64, temperature_c: f64) -> SpeciesValues {
    let a = debye_a(temperature_c);
    let b = debye_b(temperature_c);
    let sqrt_i = ionic_strength.max(0.0).sqrt();

    SpeciesValues::ideal().map(|species, _| {
        let z = f64::from(species.charge());
        if z == 0.0 {
            return 1.0;
        }
        let log_gamma = -a * z * z * sqrt_i / (1.0 + b * species.ion_size_angstrom() * sqrt_i);
        10f64.powf(log_gamma)
    })
}

/// Davies equation up to [`DAVIES_LIMIT`], extended Debye-Hückel beyond it.
///
/// $$ \log_{10} \gamma_i = -A z_i^2 \left( \frac{\sqrt{I}}{1 + \sqrt{I}} - 0.3 I \right) $$
pub fn davies(ionic_strength: f64, temperature_c: f64) -> SpeciesValues {
    let ionic_strength = ionic_strength.max(0.0);
    if ionic_strength > DAVIES_LIMIT {
        return extended(ionic_strength, temperature_c);
    }
    let a = debye_a(temperature_c);
    let sqrt_i = ionic_strength.sqrt();
    let bracket = sqrt_i / (1.0 + sqrt_i) - DAVIES_COEFF * ionic_strength;

    SpeciesValues::ideal().map(|species: Species, _| {
        let z = f64::from(species.charge());
        10f64.powf(-a * z * z * bracket)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parameters_at_25c() {
        assert_relative_eq!(debye_a(25.0), 0.509, epsilon = 1e-3);
        assert_relative_eq!(debye_b(25.0), 0.328, epsilon = 1e-3);
    }

    #[test]
    fn test_unit_coefficients_at_zero_ionic_strength() {
        for (_, gamma) in extended(0.0, 25.0).iter() {
            assert_eq!(gamma, 1.0);
        }
        for (_, gamma) in davies(0.0, 25.0).iter() {
            assert_eq!(gamma, 1.0);
        }
    }

    #[test]
    fn test_divalent_ions_more_strongly_corrected() {
        let gamma = extended(0.1, 25.0);
        assert!(gamma[Species::Carbonate] < gamma[Species::Bicarbonate]);
        assert!(gamma[Species::Bicarbonate] < 1.0);
        assert_eq!(gamma[Species::CarbonicAcid], 1.0);
    }

    #[test]
    fn test_davies_matches_reference_value() {
        // log γ(z=1) at I = 0.1: -0.509 * (0.2402 - 0.03) = -0.1070
        let gamma = davies(0.1, 25.0);
        assert_relative_eq!(gamma[Species::Sodium].log10(), -0.1070, epsilon = 5e-4);
    }

    #[test]
    fn test_davies_switches_to_extended_above_limit() {
        assert_eq!(davies(1.0, 25.0), extended(1.0, 25.0));
    }
}
