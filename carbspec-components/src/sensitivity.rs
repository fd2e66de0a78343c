//! Local sensitivity of the equilibrium to its inputs.
//!
//! Each whitelisted parameter is perturbed up and down by a fixed fraction of its baseline
//! value with everything else held fixed. The normalized sensitivity of an output `y` to a
//! parameter `x` is
//!
//! $$ S = \frac{\Delta y}{\Delta x / x} $$
//!
//! Rows are independent solves: a failed row records its failure and the remaining rows
//! are still computed.

use crate::parameters::InputParameter;
use carbspec_core::{
    EquilibriumSolver, SolubilityInputs, SolveError, SolveFailure, SolveResult, SpeciationResult,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Settings for a sensitivity run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivitySettings {
    /// Parameters to perturb, in output order.
    pub parameters: Vec<InputParameter>,
    /// Relative perturbation applied in each direction.
    /// default: 0.05
    pub fraction: f64,
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            parameters: vec![
                InputParameter::DoseAmount,
                InputParameter::SolutionVolume,
                InputParameter::Temperature,
                InputParameter::HeadspacePco2,
                InputParameter::Co2Uptake,
            ],
            fraction: 0.05,
        }
    }
}

impl SensitivitySettings {
    pub fn validate(&self) -> SolveResult<()> {
        if !(self.fraction.is_finite() && self.fraction > 0.0 && self.fraction < 1.0) {
            return Err(SolveError::InvalidInput {
                field: "sensitivity.fraction".to_string(),
                reason: format!("must lie in (0, 1), got {}", self.fraction),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    fn sign(self) -> f64 {
        match self {
            Direction::Increase => 1.0,
            Direction::Decrease => -1.0,
        }
    }
}

/// Output changes of one perturbed solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityMeasure {
    pub result: Box<SpeciationResult>,
    pub delta_ph: f64,
    pub delta_ionic_strength: f64,
    /// ΔpH per relative change of the input.
    pub normalized_ph: f64,
    /// ΔI per relative change of the input.
    pub normalized_ionic_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityOutcome {
    Computed(SensitivityMeasure),
    /// Baseline value is zero, so a relative perturbation is undefined. No solve is run.
    Undefined,
    Failed(SolveFailure),
}

/// One perturbation of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
    pub parameter: InputParameter,
    pub direction: Direction,
    /// Signed relative perturbation.
    pub fraction: f64,
    pub baseline_value: f64,
    pub perturbed_value: f64,
    pub outcome: SensitivityOutcome,
}

impl SensitivityRow {
    pub fn measure(&self) -> Option<&SensitivityMeasure> {
        match &self.outcome {
            SensitivityOutcome::Computed(measure) => Some(measure),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.outcome, SensitivityOutcome::Undefined)
    }

    pub fn failure(&self) -> Option<&SolveFailure> {
        match &self.outcome {
            SensitivityOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Baseline plus one row per parameter and direction. The baseline is not a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    pub baseline: SpeciationResult,
    pub rows: Vec<SensitivityRow>,
}

impl SensitivityTable {
    /// Parameters ordered by their largest |normalized ΔpH|, most influential first.
    ///
    /// Undefined and failed rows take no part; a parameter without any computed row is
    /// absent.
    pub fn ranking(&self) -> Vec<(InputParameter, f64)> {
        let mut ranking: Vec<(InputParameter, f64)> = Vec::new();
        for row in &self.rows {
            let Some(measure) = row.measure() else {
                continue;
            };
            let magnitude = measure.normalized_ph.abs();
            match ranking.iter_mut().find(|(p, _)| *p == row.parameter) {
                Some(entry) => entry.1 = entry.1.max(magnitude),
                None => ranking.push((row.parameter, magnitude)),
            }
        }
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }

    pub fn undefined_parameters(&self) -> Vec<InputParameter> {
        let mut parameters: Vec<InputParameter> = self
            .rows
            .iter()
            .filter(|row| row.is_undefined())
            .map(|row| row.parameter)
            .collect();
        parameters.dedup();
        parameters
    }

    pub fn failed_rows(&self) -> impl Iterator<Item = &SensitivityRow> {
        self.rows.iter().filter(|row| row.failure().is_some())
    }
}

/// Runs perturbation studies against a fixed solver.
#[derive(Debug, Clone)]
pub struct SensitivityEngine {
    solver: EquilibriumSolver,
    settings: SensitivitySettings,
}

impl SensitivityEngine {
    pub fn new(solver: EquilibriumSolver, settings: SensitivitySettings) -> Self {
        Self { solver, settings }
    }

    pub fn settings(&self) -> &SensitivitySettings {
        &self.settings
    }

    /// Solve the baseline and every perturbation.
    ///
    /// Only a failed baseline (or invalid settings) is an error; perturbation failures are
    /// recorded in their rows.
    pub fn run(&self, inputs: &SolubilityInputs) -> SolveResult<SensitivityTable> {
        self.settings.validate()?;
        let baseline = self.solver.solve(inputs)?;
        let seed = Some(baseline.seed());

        let mut rows = Vec::with_capacity(2 * self.settings.parameters.len());
        for &parameter in &self.settings.parameters {
            let baseline_value = parameter.value(inputs);
            for direction in [Direction::Increase, Direction::Decrease] {
                let fraction = direction.sign() * self.settings.fraction;
                let perturbed_value = baseline_value * (1.0 + fraction);

                let outcome = if baseline_value == 0.0 {
                    debug!("Sensitivity to {parameter} is undefined at a zero baseline");
                    SensitivityOutcome::Undefined
                } else {
                    let perturbed = parameter.apply(inputs, perturbed_value);
                    match self.solver.solve_seeded(&perturbed, seed) {
                        Ok(result) => {
                            let delta_ph = result.ph - baseline.ph;
                            let delta_ionic_strength =
                                result.ionic_strength - baseline.ionic_strength;
                            SensitivityOutcome::Computed(SensitivityMeasure {
                                result: Box::new(result),
                                delta_ph,
                                delta_ionic_strength,
                                normalized_ph: delta_ph / fraction,
                                normalized_ionic_strength: delta_ionic_strength / fraction,
                            })
                        }
                        Err(error) => {
                            warn!("Sensitivity solve for {parameter} ({direction:?}) failed: {error}");
                            SensitivityOutcome::Failed(error.into())
                        }
                    }
                };

                rows.push(SensitivityRow {
                    parameter,
                    direction,
                    fraction,
                    baseline_value,
                    perturbed_value,
                    outcome,
                });
            }
        }

        Ok(SensitivityTable { baseline, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbspec_core::{Dose, ModelKind, ModelResources, Reagent};

    fn engine(settings: SensitivitySettings) -> SensitivityEngine {
        let solver =
            EquilibriumSolver::resolve(ModelKind::DebyeHuckelFull, &ModelResources::default())
                .unwrap();
        SensitivityEngine::new(solver, settings)
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let engine = engine(SensitivitySettings {
            fraction: 0.0,
            ..Default::default()
        });
        let inputs = SolubilityInputs::default();
        assert!(matches!(
            engine.run(&inputs),
            Err(SolveError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_two_rows_per_parameter() {
        let engine = engine(SensitivitySettings::default());
        let inputs = SolubilityInputs::new(Dose::moles(Reagent::SodiumCarbonate, 0.05), 1.0)
            .with_co2_uptake(0.01);
        let table = engine.run(&inputs).unwrap();

        assert_eq!(table.rows.len(), 2 * engine.settings().parameters.len());
        assert_eq!(table.rows[0].direction, Direction::Increase);
        assert_eq!(table.rows[1].direction, Direction::Decrease);
        assert_eq!(table.rows[0].fraction, 0.05);
        assert_eq!(table.rows[1].fraction, -0.05);
    }
}
