//! Aqueous species tracked by the speciation engine.
//!
//! The system is deliberately small: the sodium counter-ion, water's ions and the three
//! inorganic carbon species. [`SpeciesValues`] is a dense per-species vector used for
//! concentrations, activity coefficients and activities alike.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// An aqueous species in the Na–CO2–H2O system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Sodium,
    Hydrogen,
    Hydroxide,
    Bicarbonate,
    Carbonate,
    /// Undissociated carbonic species, CO2(aq) + H2CO3.
    CarbonicAcid,
}

impl Species {
    /// All species in storage order.
    pub const ALL: [Species; 6] = [
        Species::Sodium,
        Species::Hydrogen,
        Species::Hydroxide,
        Species::Bicarbonate,
        Species::Carbonate,
        Species::CarbonicAcid,
    ];

    /// Carbon-bearing species, from most protonated to least.
    pub const CARBON: [Species; 3] = [
        Species::CarbonicAcid,
        Species::Bicarbonate,
        Species::Carbonate,
    ];

    const fn index(self) -> usize {
        match self {
            Species::Sodium => 0,
            Species::Hydrogen => 1,
            Species::Hydroxide => 2,
            Species::Bicarbonate => 3,
            Species::Carbonate => 4,
            Species::CarbonicAcid => 5,
        }
    }

    /// Formal charge.
    pub const fn charge(self) -> i32 {
        match self {
            Species::Sodium | Species::Hydrogen => 1,
            Species::Hydroxide | Species::Bicarbonate => -1,
            Species::Carbonate => -2,
            Species::CarbonicAcid => 0,
        }
    }

    /// Ion-size parameter `å` for the extended Debye-Hückel equation (Å).
    pub const fn ion_size_angstrom(self) -> f64 {
        match self {
            Species::Sodium | Species::Hydrogen => 9.0,
            Species::Hydroxide => 3.5,
            Species::Bicarbonate => 4.3,
            Species::Carbonate => 4.0,
            Species::CarbonicAcid => 0.0,
        }
    }

    /// Molar mass (g/mol).
    pub const fn molar_mass(self) -> f64 {
        match self {
            Species::Sodium => 22.989769,
            Species::Hydrogen => 1.00784,
            Species::Hydroxide => 17.007,
            Species::Bicarbonate => 61.01684,
            Species::Carbonate => 60.0089,
            Species::CarbonicAcid => 62.02484,
        }
    }

    /// Conventional formula label.
    pub const fn label(self) -> &'static str {
        match self {
            Species::Sodium => "Na+",
            Species::Hydrogen => "H+",
            Species::Hydroxide => "OH-",
            Species::Bicarbonate => "HCO3-",
            Species::Carbonate => "CO3^2-",
            Species::CarbonicAcid => "H2CO3*",
        }
    }

    pub const fn is_carbon(self) -> bool {
        matches!(
            self,
            Species::CarbonicAcid | Species::Bicarbonate | Species::Carbonate
        )
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A dense vector holding one value per [`Species`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeciesValues([f64; 6]);

impl SpeciesValues {
    /// A vector with every species set to `value`.
    pub const fn filled(value: f64) -> Self {
        Self([value; 6])
    }

    /// Unit activity coefficients (ideal solution).
    pub const fn ideal() -> Self {
        Self::filled(1.0)
    }

    pub fn get(&self, species: Species) -> f64 {
        self.0[species.index()]
    }

    pub fn set(&mut self, species: Species, value: f64) {
        self.0[species.index()] = value;
    }

    /// Iterate `(species, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Species, f64)> + '_ {
        Species::ALL.iter().map(move |s| (*s, self.get(*s)))
    }

    /// Apply `f` to every value.
    pub fn map(&self, mut f: impl FnMut(Species, f64) -> f64) -> Self {
        let mut out = *self;
        for species in Species::ALL {
            out.set(species, f(species, self.get(species)));
        }
        out
    }

    /// Element-wise product, e.g. concentrations × activity coefficients.
    pub fn product(&self, other: &SpeciesValues) -> Self {
        self.map(|s, v| v * other.get(s))
    }

    /// Ionic strength `0.5 Σ cᵢ zᵢ²` treating the values as concentrations.
    pub fn ionic_strength(&self) -> f64 {
        0.5 * self
            .iter()
            .map(|(s, c)| c * f64::from(s.charge() * s.charge()))
            .sum::<f64>()
    }

    /// Total dissolved inorganic carbon.
    pub fn total_carbon(&self) -> f64 {
        Species::CARBON.iter().map(|s| self.get(*s)).sum()
    }

    /// Net charge `Σ cᵢ zᵢ`.
    pub fn net_charge(&self) -> f64 {
        self.iter().map(|(s, c)| c * f64::from(s.charge())).sum()
    }

    /// Total charge magnitude `Σ cᵢ |zᵢ|`, used to scale the charge-balance tolerance.
    pub fn charge_magnitude(&self) -> f64 {
        self.iter()
            .map(|(s, c)| c.abs() * f64::from(s.charge().abs()))
            .sum()
    }

    /// True when every value is finite and non-negative.
    pub fn is_physical(&self) -> bool {
        self.0.iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Index<Species> for SpeciesValues {
    type Output = f64;

    fn index(&self, species: Species) -> &f64 {
        &self.0[species.index()]
    }
}

impl IndexMut<Species> for SpeciesValues {
    fn index_mut(&mut self, species: Species) -> &mut f64 {
        &mut self.0[species.index()]
    }
}
