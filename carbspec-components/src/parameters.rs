//! Scalar inputs that batch engines perturb or sweep.

use carbspec_core::SolubilityInputs;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar field of [`SolubilityInputs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputParameter {
    /// Reagent amount, in the unit the dose was given in.
    DoseAmount,
    SolutionVolume,
    Temperature,
    HeadspacePco2,
    HenryConstant,
    Co2Uptake,
}

impl InputParameter {
    pub const ALL: [InputParameter; 6] = [
        InputParameter::DoseAmount,
        InputParameter::SolutionVolume,
        InputParameter::Temperature,
        InputParameter::HeadspacePco2,
        InputParameter::HenryConstant,
        InputParameter::Co2Uptake,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            InputParameter::DoseAmount => "dose",
            InputParameter::SolutionVolume => "solution volume (L)",
            InputParameter::Temperature => "temperature (°C)",
            InputParameter::HeadspacePco2 => "headspace pCO2 (atm)",
            InputParameter::HenryConstant => "Henry constant (mol/(L·atm))",
            InputParameter::Co2Uptake => "CO2 uptake (mol)",
        }
    }

    /// Current value; unset optional fields read as zero.
    pub fn value(self, inputs: &SolubilityInputs) -> f64 {
        match self {
            InputParameter::DoseAmount => inputs.dose.raw_amount(),
            InputParameter::SolutionVolume => inputs.volume_l().unwrap_or(0.0),
            InputParameter::Temperature => inputs.temperature_c,
            InputParameter::HeadspacePco2 => inputs.headspace_pco2_atm.unwrap_or(0.0),
            InputParameter::HenryConstant => inputs.henry_constant_m_per_atm.unwrap_or(0.0),
            InputParameter::Co2Uptake => inputs.co2_uptake_mol,
        }
    }

    /// A copy of `inputs` with this parameter set to `value`.
    pub fn apply(self, inputs: &SolubilityInputs, value: f64) -> SolubilityInputs {
        let mut updated = inputs.clone();
        match self {
            InputParameter::DoseAmount => updated.dose = inputs.dose.with_raw_amount(value),
            InputParameter::SolutionVolume => updated.solution_volume_l = Some(value),
            InputParameter::Temperature => updated.temperature_c = value,
            InputParameter::HeadspacePco2 => updated.headspace_pco2_atm = Some(value),
            InputParameter::HenryConstant => updated.henry_constant_m_per_atm = Some(value),
            InputParameter::Co2Uptake => updated.co2_uptake_mol = value,
        }
        updated
    }
}

impl fmt::Display for InputParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
