//! Per-cycle speciation over a sequence of gas-uptake cycles.
//!
//! The timeline is always re-derived from the full payload sequence. Entry `i` reflects the
//! base inputs plus every accepted payload up to and including `i`, so editing an early
//! payload changes every later entry on the next run.

use crate::ledger::{LedgerState, LedgerStep};
use carbspec_core::{
    EquilibriumSolver, SolubilityInputs, SolveFailure, SolverSeed, SpeciationResult,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Gas uptake of one pressure/temperature cycle, from upstream cycle analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclePayload {
    pub cycle_index: usize,
    /// CO2 taken up during the cycle (mol).
    pub delta_mol: f64,
    pub mean_temperature_c: Option<f64>,
}

impl CyclePayload {
    pub fn new(cycle_index: usize, delta_mol: f64) -> Self {
        Self {
            cycle_index,
            delta_mol,
            mean_temperature_c: None,
        }
    }

    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.mean_temperature_c = Some(temperature_c);
        self
    }

    /// Payloads with a negative or non-finite uptake, or a non-finite temperature, are not
    /// applied.
    pub fn is_acceptable(&self) -> bool {
        self.delta_mol.is_finite()
            && self.delta_mol >= 0.0
            && self.mean_temperature_c.map_or(true, f64::is_finite)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineOutcome {
    Solved(Box<SpeciationResult>),
    Failed(SolveFailure),
}

/// Cumulative state after one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Position of the originating payload in the input sequence.
    pub payload_index: usize,
    pub cycle_index: usize,
    /// False when the payload was rejected and contributed nothing.
    pub accepted: bool,
    /// Base uptake plus all accepted deltas so far (mol).
    pub cumulative_uptake_mol: f64,
    pub temperature_c: f64,
    /// Payload index of the converged cycle whose result seeded this solve.
    pub seeded_from: Option<usize>,
    pub ledger: LedgerState,
    pub step: LedgerStep,
    pub outcome: TimelineOutcome,
}

impl TimelineEntry {
    pub fn result(&self) -> Option<&SpeciationResult> {
        match &self.outcome {
            TimelineOutcome::Solved(result) => Some(result),
            TimelineOutcome::Failed(_) => None,
        }
    }
}

/// Timeline entries, one per payload in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn final_ledger(&self) -> Option<&LedgerState> {
        self.entries.last().map(|e| &e.ledger)
    }

    pub fn rejected_payloads(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| !e.accepted)
            .map(|e| e.payload_index)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TimelineIntegrator {
    solver: EquilibriumSolver,
}

impl TimelineIntegrator {
    pub fn new(solver: EquilibriumSolver) -> Self {
        Self { solver }
    }

    /// Derive the timeline for `payloads` on top of `base`.
    ///
    /// Each cycle is a full solve seeded from the previous cycle's converged result.
    pub fn run(&self, base: &SolubilityInputs, payloads: &[CyclePayload]) -> Timeline {
        let mut cumulative_uptake = base.co2_uptake_mol;
        let mut ledger = LedgerState::from_dose(&base.dose);
        ledger.absorb(base.co2_uptake_mol);
        let mut seed: Option<(usize, SolverSeed)> = None;
        let mut entries = Vec::with_capacity(payloads.len());

        for (payload_index, payload) in payloads.iter().enumerate() {
            let accepted = payload.is_acceptable();
            let step = if accepted {
                cumulative_uptake += payload.delta_mol;
                ledger.absorb(payload.delta_mol)
            } else {
                warn!(
                    "Ignoring cycle {} payload with uptake {} mol",
                    payload.cycle_index, payload.delta_mol
                );
                LedgerStep::default()
            };

            let mut inputs = base.clone().with_co2_uptake(cumulative_uptake);
            if let (true, Some(temperature)) = (accepted, payload.mean_temperature_c) {
                inputs.temperature_c = temperature;
            }

            let seeded_from = seed.map(|(i, _)| i);
            let outcome = match self.solver.solve_seeded(&inputs, seed.map(|(_, s)| s)) {
                Ok(result) => {
                    seed = Some((payload_index, result.seed()));
                    TimelineOutcome::Solved(Box::new(result))
                }
                Err(error) => {
                    warn!("Timeline cycle {} failed: {error}", payload.cycle_index);
                    TimelineOutcome::Failed(error.into())
                }
            };

            entries.push(TimelineEntry {
                payload_index,
                cycle_index: payload.cycle_index,
                accepted,
                cumulative_uptake_mol: cumulative_uptake,
                temperature_c: inputs.temperature_c,
                seeded_from,
                ledger,
                step,
                outcome,
            });
        }

        debug!("Timeline derived for {} cycles", entries.len());
        Timeline { entries }
    }
}
