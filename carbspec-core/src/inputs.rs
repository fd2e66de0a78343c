//! Solve inputs.
//!
//! [`SolubilityInputs`] is a plain value: every solve receives its own copy, so a submitted
//! input set can never change underneath a running solve.

use crate::activity::ModelKind;
use crate::constants::{MW_NA2CO3, MW_NAHCO3, MW_NAOH, WATER_DENSITY_25C_G_PER_ML};
use crate::errors::{SolveError, SolveResult};
use serde::{Deserialize, Serialize};

/// Sodium reagent dosed into the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reagent {
    /// NaHCO3
    SodiumBicarbonate,
    /// Na2CO3
    SodiumCarbonate,
    /// NaOH
    SodiumHydroxide,
}

impl Reagent {
    /// Molar mass (g/mol).
    pub const fn molar_mass(self) -> f64 {
        match self {
            Reagent::SodiumBicarbonate => MW_NAHCO3,
            Reagent::SodiumCarbonate => MW_NA2CO3,
            Reagent::SodiumHydroxide => MW_NAOH,
        }
    }

    /// Moles of Na+ released per mole of reagent.
    pub const fn sodium_per_mole(self) -> f64 {
        match self {
            Reagent::SodiumBicarbonate | Reagent::SodiumHydroxide => 1.0,
            Reagent::SodiumCarbonate => 2.0,
        }
    }

    /// Moles of inorganic carbon released per mole of reagent.
    pub const fn carbon_per_mole(self) -> f64 {
        match self {
            Reagent::SodiumBicarbonate | Reagent::SodiumCarbonate => 1.0,
            Reagent::SodiumHydroxide => 0.0,
        }
    }
}

/// Amount of reagent, by mass or by moles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseAmount {
    Grams(f64),
    Moles(f64),
}

/// A reagent dose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dose {
    pub reagent: Reagent,
    pub amount: DoseAmount,
}

impl Dose {
    pub fn grams(reagent: Reagent, grams: f64) -> Self {
        Self {
            reagent,
            amount: DoseAmount::Grams(grams),
        }
    }

    pub fn moles(reagent: Reagent, moles: f64) -> Self {
        Self {
            reagent,
            amount: DoseAmount::Moles(moles),
        }
    }

    /// Dose expressed in moles of reagent.
    pub fn total_moles(&self) -> f64 {
        match self.amount {
            DoseAmount::Grams(g) => g / self.reagent.molar_mass(),
            DoseAmount::Moles(n) => n,
        }
    }

    /// Raw amount in the unit it was specified in.
    pub fn raw_amount(&self) -> f64 {
        match self.amount {
            DoseAmount::Grams(v) | DoseAmount::Moles(v) => v,
        }
    }

    /// The same dose with the amount replaced, keeping the unit.
    pub fn with_raw_amount(&self, value: f64) -> Self {
        let amount = match self.amount {
            DoseAmount::Grams(_) => DoseAmount::Grams(value),
            DoseAmount::Moles(_) => DoseAmount::Moles(value),
        };
        Self {
            reagent: self.reagent,
            amount,
        }
    }
}

/// How total inorganic carbon is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeciationMode {
    /// Total carbon = dosed inventory + Henry's-law dissolved CO2 at the headspace pCO2.
    #[serde(rename = "fixed_pCO2")]
    FixedPco2,
    /// Total carbon is the closed dosed inventory; no exchange with a gas phase.
    #[serde(rename = "closed_carbon")]
    ClosedCarbon,
}

/// Maximum dissolved concentrations (mol/L) of the bicarbonate and carbonate salts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SolubilityCaps {
    pub bicarbonate_m: Option<f64>,
    pub carbonate_m: Option<f64>,
}

/// Tolerances, iteration caps and search domain of the equilibrium solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// pH interval searched by the bisection.
    /// default: (0.0, 14.0)
    pub ph_domain: (f64, f64),
    /// Half-width of the narrowed bracket around a prior pH estimate.
    /// default: 1.0
    pub seed_window: f64,
    /// Bisection stops once the bracket is narrower than this.
    /// default: 1e-10
    pub ph_tolerance: f64,
    /// Absolute charge-balance residual (mol/L) at which the bisection stops early.
    /// default: 1e-15
    pub residual_tolerance: f64,
    /// Accepted residual relative to the total charge `Σ c|z|`.
    /// default: 1e-8
    pub relative_charge_tolerance: f64,
    /// Outer loop stops once ionic strength changes by less than this (mol/L).
    /// default: 1e-10
    pub ionic_strength_tolerance: f64,
    /// default: 200
    pub max_inner_iterations: usize,
    /// default: 100
    pub max_outer_iterations: usize,
    /// Use the quartic closed form as a first estimate where the model allows it.
    /// default: true
    pub use_closed_form: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ph_domain: (0.0, 14.0),
            seed_window: 1.0,
            ph_tolerance: 1e-10,
            residual_tolerance: 1e-15,
            relative_charge_tolerance: 1e-8,
            ionic_strength_tolerance: 1e-10,
            max_inner_iterations: 200,
            max_outer_iterations: 100,
            use_closed_form: true,
        }
    }
}

impl SolverOptions {
    fn validate(&self) -> SolveResult<()> {
        let (low, high) = self.ph_domain;
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(SolveError::invalid_input(
                "solver.ph_domain",
                format!("expected a finite interval with low < high, got [{low}, {high}]"),
            ));
        }
        let positive = [
            ("solver.seed_window", self.seed_window),
            ("solver.ph_tolerance", self.ph_tolerance),
            ("solver.residual_tolerance", self.residual_tolerance),
            (
                "solver.relative_charge_tolerance",
                self.relative_charge_tolerance,
            ),
            (
                "solver.ionic_strength_tolerance",
                self.ionic_strength_tolerance,
            ),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SolveError::invalid_input(
                    field,
                    format!("must be positive, got {value}"),
                ));
            }
        }
        if self.max_inner_iterations == 0 || self.max_outer_iterations == 0 {
            return Err(SolveError::invalid_input(
                "solver.max_iterations",
                "iteration caps must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Starting point for a solve, usually taken from a neighbouring converged result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSeed {
    pub ph: f64,
    pub ionic_strength: f64,
}

/// User-supplied dissolution inputs for one speciation solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolubilityInputs {
    pub dose: Dose,
    /// CO2 absorbed from the gas phase (mol), adding carbon without a counter-ion.
    #[serde(default)]
    pub co2_uptake_mol: f64,
    /// Water mass (g); used for the volume when `solution_volume_l` is absent.
    pub water_mass_g: Option<f64>,
    pub solution_volume_l: Option<f64>,
    pub temperature_c: f64,
    pub initial_ph_guess: f64,
    pub headspace_pco2_atm: Option<f64>,
    /// Henry's-law constant for CO2 (mol/(L·atm)).
    pub henry_constant_m_per_atm: Option<f64>,
    pub mode: SpeciationMode,
    pub model: ModelKind,
    pub solubility_caps: Option<SolubilityCaps>,
    /// Ionic strength cap for the capped Debye-Hückel model (mol/L).
    pub ionic_strength_cap: Option<f64>,
    #[serde(default)]
    pub use_temperature_adjusted_constants: bool,
    /// Share of the carbon inventory lost to degassing, in [0, 1). Applies to the override too.
    #[serde(default)]
    pub degassed_fraction: f64,
    /// Closed-inventory override for the total inorganic carbon (mol).
    pub total_inorganic_carbon_mol: Option<f64>,
    #[serde(default)]
    pub solver: SolverOptions,
}

impl Default for SolubilityInputs {
    /// 10 g NaHCO3 in 1 kg of water at 25 °C.
    fn default() -> Self {
        Self {
            dose: Dose::grams(Reagent::SodiumBicarbonate, 10.0),
            co2_uptake_mol: 0.0,
            water_mass_g: Some(1000.0),
            solution_volume_l: None,
            temperature_c: 25.0,
            initial_ph_guess: 8.35,
            headspace_pco2_atm: None,
            henry_constant_m_per_atm: None,
            mode: SpeciationMode::ClosedCarbon,
            model: ModelKind::default(),
            solubility_caps: None,
            ionic_strength_cap: None,
            use_temperature_adjusted_constants: false,
            degassed_fraction: 0.0,
            total_inorganic_carbon_mol: None,
            solver: SolverOptions::default(),
        }
    }
}

impl SolubilityInputs {
    /// Inputs for `dose` dissolved into `volume_l` litres, other fields at their defaults.
    pub fn new(dose: Dose, volume_l: f64) -> Self {
        Self {
            dose,
            water_mass_g: None,
            solution_volume_l: Some(volume_l),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: SpeciationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn with_headspace(mut self, pco2_atm: f64, henry_constant_m_per_atm: f64) -> Self {
        self.headspace_pco2_atm = Some(pco2_atm);
        self.henry_constant_m_per_atm = Some(henry_constant_m_per_atm);
        self
    }

    pub fn with_co2_uptake(mut self, co2_uptake_mol: f64) -> Self {
        self.co2_uptake_mol = co2_uptake_mol;
        self
    }

    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    /// Solution volume (L), from the explicit volume or the water mass.
    pub fn volume_l(&self) -> SolveResult<f64> {
        let volume = match (self.solution_volume_l, self.water_mass_g) {
            (Some(v), _) => v,
            (None, Some(mass)) => mass / WATER_DENSITY_25C_G_PER_ML / 1000.0,
            (None, None) => {
                return Err(SolveError::invalid_input(
                    "solution_volume_l",
                    "provide either a solution volume or a water mass",
                ))
            }
        };
        if !(volume.is_finite() && volume > 0.0) {
            return Err(SolveError::invalid_input(
                "solution_volume_l",
                format!("volume must be positive, got {volume}"),
            ));
        }
        Ok(volume)
    }

    /// Headspace contribution to dissolved carbon, `K_H · pCO2` (mol/L).
    pub fn headspace_carbon_m(&self) -> Option<f64> {
        match (self.headspace_pco2_atm, self.henry_constant_m_per_atm) {
            (Some(p), Some(kh)) if p > 0.0 && kh > 0.0 => Some(p * kh),
            _ => None,
        }
    }

    /// Reject inputs that cannot describe a physical solution.
    ///
    /// Runs before any numerical work starts.
    pub fn validate(&self) -> SolveResult<()> {
        let amount = self.dose.raw_amount();
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(SolveError::invalid_input(
                "dose",
                format!("dose must be non-negative, got {amount}"),
            ));
        }
        if !(self.co2_uptake_mol.is_finite() && self.co2_uptake_mol >= 0.0) {
            return Err(SolveError::invalid_input(
                "co2_uptake_mol",
                format!("CO2 uptake must be non-negative, got {}", self.co2_uptake_mol),
            ));
        }
        if let Some(mass) = self.water_mass_g {
            if !(mass.is_finite() && mass > 0.0) {
                return Err(SolveError::invalid_input(
                    "water_mass_g",
                    format!("water mass must be positive, got {mass}"),
                ));
            }
        }
        self.volume_l()?;
        if !(self.temperature_c.is_finite() && self.temperature_c > -273.15) {
            return Err(SolveError::invalid_input(
                "temperature_c",
                format!("temperature must be above absolute zero, got {}", self.temperature_c),
            ));
        }

        self.solver.validate()?;
        let (low, high) = self.solver.ph_domain;
        if !(self.initial_ph_guess.is_finite()
            && self.initial_ph_guess >= low
            && self.initial_ph_guess <= high)
        {
            return Err(SolveError::invalid_input(
                "initial_ph_guess",
                format!(
                    "initial pH guess {} lies outside the pH domain [{low}, {high}]",
                    self.initial_ph_guess
                ),
            ));
        }

        for (field, value) in [
            ("headspace_pco2_atm", self.headspace_pco2_atm),
            ("henry_constant_m_per_atm", self.henry_constant_m_per_atm),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(SolveError::invalid_input(
                        field,
                        format!("must be non-negative, got {v}"),
                    ));
                }
            }
        }
        match self.mode {
            SpeciationMode::FixedPco2 => {
                if self.headspace_pco2_atm.is_none() || self.henry_constant_m_per_atm.is_none() {
                    return Err(SolveError::invalid_input(
                        "mode",
                        "fixed_pCO2 mode requires both a headspace pCO2 and a Henry's-law constant",
                    ));
                }
                if self.total_inorganic_carbon_mol.is_some() {
                    return Err(SolveError::invalid_input(
                        "total_inorganic_carbon_mol",
                        "a closed carbon inventory cannot be combined with fixed_pCO2 mode",
                    ));
                }
            }
            SpeciationMode::ClosedCarbon => {
                if self.headspace_pco2_atm.is_some() {
                    return Err(SolveError::invalid_input(
                        "headspace_pco2_atm",
                        "closed_carbon mode has no gas exchange; use fixed_pCO2 mode for a headspace",
                    ));
                }
            }
        }

        if let Some(total) = self.total_inorganic_carbon_mol {
            if !(total.is_finite() && total >= 0.0) {
                return Err(SolveError::invalid_input(
                    "total_inorganic_carbon_mol",
                    format!("must be non-negative, got {total}"),
                ));
            }
        }
        if !(self.degassed_fraction.is_finite()
            && (0.0..1.0).contains(&self.degassed_fraction))
        {
            return Err(SolveError::invalid_input(
                "degassed_fraction",
                format!("must lie in [0, 1), got {}", self.degassed_fraction),
            ));
        }
        if let Some(cap) = self.ionic_strength_cap {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(SolveError::invalid_input(
                    "ionic_strength_cap",
                    format!("must be positive, got {cap}"),
                ));
            }
        }
        if let Some(caps) = self.solubility_caps {
            for (field, value) in [
                ("solubility_caps.bicarbonate_m", caps.bicarbonate_m),
                ("solubility_caps.carbonate_m", caps.carbonate_m),
            ] {
                if let Some(v) = value {
                    if !(v.is_finite() && v > 0.0) {
                        return Err(SolveError::invalid_input(
                            field,
                            format!("must be positive, got {v}"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
