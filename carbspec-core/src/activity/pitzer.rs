//! Pitzer virial expansion for the Na+ / OH- / HCO3- / CO3-2 system.
//!
//! Only the sodium salts carry binary interactions. Mixing terms are limited to
//! θ(CO3-2, OH-) and the two ψ triplets that share Na+. Unsymmetrical mixing (E-θ) is
//! not included.

use crate::constants::{PITZER_ALPHA1, PITZER_B};
use crate::species::{Species, SpeciesValues};
use serde::{Deserialize, Serialize};

/// Anions with a binary interaction against Na+.
pub const PITZER_ANIONS: [Species; 3] = [
    Species::Hydroxide,
    Species::Bicarbonate,
    Species::Carbonate,
];

/// Binary Na+/anion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BinaryParameters {
    pub beta0: f64,
    pub beta1: f64,
    pub c_phi: f64,
}

/// Full parameter set for the Pitzer model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitzerParameters {
    pub na_oh: BinaryParameters,
    pub na_hco3: BinaryParameters,
    pub na_co3: BinaryParameters,
    /// θ(CO3-2, OH-)
    pub theta_co3_oh: f64,
    /// ψ(CO3-2, Na+, OH-)
    pub psi_co3_na_oh: f64,
    /// ψ(CO3-2, HCO3-, Na+)
    pub psi_co3_hco3_na: f64,
}

impl PitzerParameters {
    /// Built-in Harvie-Møller-Weare binary coefficients at 25 °C, without mixing terms.
    pub const fn hmw_binaries() -> Self {
        Self {
            na_oh: BinaryParameters {
                beta0: 0.0864,
                beta1: 0.253,
                c_phi: 0.0044,
            },
            na_hco3: BinaryParameters {
                beta0: 0.0277,
                beta1: 0.0411,
                c_phi: 0.0,
            },
            na_co3: BinaryParameters {
                beta0: 0.0399,
                beta1: 1.389,
                c_phi: 0.0044,
            },
            theta_co3_oh: 0.0,
            psi_co3_na_oh: 0.0,
            psi_co3_hco3_na: 0.0,
        }
    }

    /// Binary coefficients of Na+ with `anion`, if it has any.
    pub fn binary(&self, anion: Species) -> Option<&BinaryParameters> {
        match anion {
            Species::Hydroxide => Some(&self.na_oh),
            Species::Bicarbonate => Some(&self.na_hco3),
            Species::Carbonate => Some(&self.na_co3),
            _ => None,
        }
    }
}

impl Default for PitzerParameters {
    fn default() -> Self {
        Self::hmw_binaries()
    }
}

/// Osmotic Debye-Hückel slope Aφ at `temperature_c`; 0.392 at 25 °C.
pub fn a_phi(temperature_c: f64) -> f64 {
    let t = temperature_c.clamp(0.0, 100.0);
    0.3770 + 4.684e-4 * t + 3.74e-6 * t * t
}

fn g(x: f64) -> f64 {
    2.0 * (1.0 - (1.0 + x) * (-x).exp()) / (x * x)
}

fn g_prime(x: f64) -> f64 {
    -2.0 * (1.0 - (1.0 + x + 0.5 * x * x) * (-x).exp()) / (x * x)
}

/// Activity coefficients from the Pitzer equations.
///
/// `composition` holds molal concentrations (taken equal to molar in dilute solution).
/// Neutral species keep γ = 1.
pub fn activity_coefficients(
    parameters: &PitzerParameters,
    ionic_strength: f64,
    composition: &SpeciesValues,
    temperature_c: f64,
) -> SpeciesValues {
    let ionic_strength = ionic_strength.max(0.0);
    let sqrt_i = ionic_strength.sqrt();
    let m = |s: Species| composition.get(s).max(0.0);
    let m_na = m(Species::Sodium);

    let x = PITZER_ALPHA1 * sqrt_i;
    let (g_x, g_prime_over_i) = if ionic_strength > 1e-12 {
        (g(x), g_prime(x) / ionic_strength)
    } else {
        (1.0, 0.0)
    };

    let b_value = |p: &BinaryParameters| p.beta0 + p.beta1 * g_x;
    let c_value = |p: &BinaryParameters, anion: Species| {
        p.c_phi / (2.0 * f64::from(anion.charge().abs()).sqrt())
    };

    // Σ m|z|
    let z_total: f64 = composition
        .iter()
        .map(|(s, c)| c.max(0.0) * f64::from(s.charge().abs()))
        .sum();

    let mut f = -a_phi(temperature_c)
        * (sqrt_i / (1.0 + PITZER_B * sqrt_i) + (2.0 / PITZER_B) * (1.0 + PITZER_B * sqrt_i).ln());
    let mut mc_sum = 0.0;
    for anion in PITZER_ANIONS {
        if let Some(p) = parameters.binary(anion) {
            f += m_na * m(anion) * p.beta1 * g_prime_over_i;
            mc_sum += m_na * m(anion) * c_value(p, anion);
        }
    }

    let m_oh = m(Species::Hydroxide);
    let m_hco3 = m(Species::Bicarbonate);
    let m_co3 = m(Species::Carbonate);

    let mut ln_gamma = SpeciesValues::filled(0.0);
    for species in Species::ALL {
        let z = f64::from(species.charge());
        if z == 0.0 {
            continue;
        }
        let mut value = z * z * f + z.abs() * mc_sum;
        match species {
            Species::Sodium => {
                for anion in PITZER_ANIONS {
                    if let Some(p) = parameters.binary(anion) {
                        value += m(anion) * (2.0 * b_value(p) + z_total * c_value(p, anion));
                    }
                }
                value += m_co3 * m_oh * parameters.psi_co3_na_oh;
                value += m_co3 * m_hco3 * parameters.psi_co3_hco3_na;
            }
            Species::Hydroxide => {
                if let Some(p) = parameters.binary(species) {
                    value += m_na * (2.0 * b_value(p) + z_total * c_value(p, species));
                }
                value += 2.0 * m_co3 * parameters.theta_co3_oh;
                value += m_na * m_co3 * parameters.psi_co3_na_oh;
            }
            Species::Bicarbonate => {
                if let Some(p) = parameters.binary(species) {
                    value += m_na * (2.0 * b_value(p) + z_total * c_value(p, species));
                }
                value += m_na * m_co3 * parameters.psi_co3_hco3_na;
            }
            Species::Carbonate => {
                if let Some(p) = parameters.binary(species) {
                    value += m_na * (2.0 * b_value(p) + z_total * c_value(p, species));
                }
                value += 2.0 * m_oh * parameters.theta_co3_oh;
                value += m_na * m_oh * parameters.psi_co3_na_oh;
                value += m_na * m_hco3 * parameters.psi_co3_hco3_na;
            }
            _ => {}
        }
        ln_gamma.set(species, value);
    }

    ln_gamma.map(|_, v| v.exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sodium_bicarbonate(molality: f64) -> SpeciesValues {
        let mut composition = SpeciesValues::default();
        composition[Species::Sodium] = molality;
        composition[Species::Bicarbonate] = molality;
        composition
    }

    #[test]
    fn test_a_phi_at_25c() {
        assert_relative_eq!(a_phi(25.0), 0.392, epsilon = 1e-3);
    }

    #[test]
    fn test_g_limits() {
        // g(x) -> 1 as x -> 0
        assert_relative_eq!(g(1e-4), 1.0, epsilon = 1e-3);
        assert!(g_prime(1.0) < 0.0);
    }

    #[test]
    fn test_dilute_limit_is_ideal() {
        let gamma = activity_coefficients(
            &PitzerParameters::hmw_binaries(),
            0.0,
            &SpeciesValues::default(),
            25.0,
        );
        for (_, value) in gamma.iter() {
            assert_eq!(value, 1.0);
        }
    }

    #[test]
    fn test_sodium_bicarbonate_coefficients_are_plausible() {
        let composition = sodium_bicarbonate(0.1);
        let gamma = activity_coefficients(
            &PitzerParameters::hmw_binaries(),
            composition.ionic_strength(),
            &composition,
            25.0,
        );

        // Mean activity coefficient of 0.1 m NaHCO3 is close to 0.78.
        let mean = (gamma[Species::Sodium] * gamma[Species::Bicarbonate]).sqrt();
        assert!(mean > 0.7 && mean < 0.85, "mean γ± = {mean}");
        assert_eq!(gamma[Species::CarbonicAcid], 1.0);
    }

    #[test]
    fn test_mixing_terms_change_carbonate() {
        let mut composition = SpeciesValues::default();
        composition[Species::Sodium] = 0.3;
        composition[Species::Carbonate] = 0.1;
        composition[Species::Hydroxide] = 0.1;
        let ionic_strength = composition.ionic_strength();

        let binaries = PitzerParameters::hmw_binaries();
        let mixed = PitzerParameters {
            theta_co3_oh: 0.1,
            psi_co3_na_oh: -0.017,
            ..binaries
        };

        let base = activity_coefficients(&binaries, ionic_strength, &composition, 25.0);
        let with_mixing = activity_coefficients(&mixed, ionic_strength, &composition, 25.0);
        assert!(with_mixing[Species::Carbonate] != base[Species::Carbonate]);
        assert_eq!(with_mixing[Species::Bicarbonate], base[Species::Bicarbonate]);
    }
}
