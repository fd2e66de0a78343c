use crate::constants::{KSP_NA2CO3, KSP_NAHCO3};
use crate::species::{Species, SpeciesValues};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Solid phases with a known solubility product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solid {
    /// NaHCO3(s)
    Nahcolite,
    /// Na2CO3(s)
    Natrite,
}

impl Solid {
    pub const ALL: [Solid; 2] = [Solid::Nahcolite, Solid::Natrite];

    pub const fn solubility_product(self) -> f64 {
        match self {
            Solid::Nahcolite => KSP_NAHCO3,
            Solid::Natrite => KSP_NA2CO3,
        }
    }

    /// Dissolution stoichiometry as `(species, coefficient)` pairs.
    pub const fn ions(self) -> &'static [(Species, i32)] {
        match self {
            Solid::Nahcolite => &[(Species::Sodium, 1), (Species::Bicarbonate, 1)],
            Solid::Natrite => &[(Species::Sodium, 2), (Species::Carbonate, 1)],
        }
    }

    pub const fn formula(self) -> &'static str {
        match self {
            Solid::Nahcolite => "NaHCO3",
            Solid::Natrite => "Na2CO3",
        }
    }
}

impl fmt::Display for Solid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.formula())
    }
}

/// Saturation index of one solid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationIndex {
    pub solid: Solid,
    /// log10(IAP / Ksp); positive means supersaturated.
    pub saturation_index: f64,
}

/// Saturation index `log10(IAP / Ksp)` of `solid`.
///
/// `None` when one of its ions is absent, so the product cannot be formed.
pub fn saturation_index(solid: Solid, activities: &SpeciesValues) -> Option<f64> {
    let mut log_iap = 0.0;
    for (species, coefficient) in solid.ions() {
        let activity = activities.get(*species);
        if !(activity.is_finite() && activity > 0.0) {
            return None;
        }
        log_iap += f64::from(*coefficient) * activity.log10();
    }
    Some(log_iap - solid.solubility_product().log10())
}

/// Saturation indices for every solid whose product can be formed.
pub fn saturation_indices(activities: &SpeciesValues) -> Vec<SaturationIndex> {
    Solid::ALL
        .into_iter()
        .filter_map(|solid| {
            saturation_index(solid, activities).map(|saturation_index| SaturationIndex {
                solid,
                saturation_index,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nahcolite_index() {
        let mut activities = SpeciesValues::default();
        activities[Species::Sodium] = 1e-2;
        activities[Species::Bicarbonate] = 1e-2;

        // log10(1e-4 / 2.5e-8)
        let si = saturation_index(Solid::Nahcolite, &activities).unwrap();
        assert_relative_eq!(si, 3.60206, epsilon = 1e-5);
    }

    #[test]
    fn test_omitted_without_counter_ion() {
        let mut activities = SpeciesValues::default();
        activities[Species::Bicarbonate] = 1e-2;
        activities[Species::Carbonate] = 1e-4;

        assert!(saturation_index(Solid::Natrite, &activities).is_none());
        assert!(saturation_indices(&activities).is_empty());
    }
}
