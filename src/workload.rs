//! Units of work accepted by the [`SolveScheduler`](crate::scheduler::SolveScheduler).
//!
//! A workload owns everything it needs (solver, inputs, ranges, payloads) so it can be moved
//! onto a worker thread and run without touching any shared state.

use carbspec_components::{
    CyclePayload, SensitivityEngine, SensitivityTable, SweepCurve, SweepEngine, SweepRange,
    SweepVariable, Timeline, TimelineIntegrator,
};
use carbspec_core::{EquilibriumSolver, SolubilityInputs, SolveResult, SpeciationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum Workload {
    Single {
        solver: EquilibriumSolver,
        inputs: SolubilityInputs,
    },
    Sensitivity {
        engine: SensitivityEngine,
        inputs: SolubilityInputs,
    },
    Sweep {
        engine: SweepEngine,
        inputs: SolubilityInputs,
        variable: SweepVariable,
        range: SweepRange,
    },
    Timeline {
        integrator: TimelineIntegrator,
        base: SolubilityInputs,
        payloads: Vec<CyclePayload>,
    },
}

impl Workload {
    pub fn single(solver: EquilibriumSolver, inputs: SolubilityInputs) -> Self {
        Workload::Single { solver, inputs }
    }

    pub fn sensitivity(engine: SensitivityEngine, inputs: SolubilityInputs) -> Self {
        Workload::Sensitivity { engine, inputs }
    }

    pub fn sweep(
        engine: SweepEngine,
        inputs: SolubilityInputs,
        variable: SweepVariable,
        range: SweepRange,
    ) -> Self {
        Workload::Sweep {
            engine,
            inputs,
            variable,
            range,
        }
    }

    pub fn timeline(
        integrator: TimelineIntegrator,
        base: SolubilityInputs,
        payloads: Vec<CyclePayload>,
    ) -> Self {
        Workload::Timeline {
            integrator,
            base,
            payloads,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Workload::Single { .. } => "single",
            Workload::Sensitivity { .. } => "sensitivity",
            Workload::Sweep { .. } => "sweep",
            Workload::Timeline { .. } => "timeline",
        }
    }

    /// Run to completion on the calling thread.
    ///
    /// Sweeps and timelines isolate their per-item failures and always succeed; single and
    /// sensitivity workloads fail when their (baseline) solve fails.
    pub fn run(self) -> SolveResult<SolveOutput> {
        match self {
            Workload::Single { solver, inputs } => {
                solver.solve(&inputs).map(|r| SolveOutput::Single(Box::new(r)))
            }
            Workload::Sensitivity { engine, inputs } => engine
                .run(&inputs)
                .map(|t| SolveOutput::Sensitivity(Box::new(t))),
            Workload::Sweep {
                engine,
                inputs,
                variable,
                range,
            } => Ok(SolveOutput::Sweep(engine.run(&inputs, variable, &range))),
            Workload::Timeline {
                integrator,
                base,
                payloads,
            } => Ok(SolveOutput::Timeline(integrator.run(&base, &payloads))),
        }
    }
}

/// Result of a completed workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveOutput {
    Single(Box<SpeciationResult>),
    Sensitivity(Box<SensitivityTable>),
    Sweep(SweepCurve),
    Timeline(Timeline),
}

impl SolveOutput {
    pub fn as_single(&self) -> Option<&SpeciationResult> {
        match self {
            SolveOutput::Single(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_sensitivity(&self) -> Option<&SensitivityTable> {
        match self {
            SolveOutput::Sensitivity(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_sweep(&self) -> Option<&SweepCurve> {
        match self {
            SolveOutput::Sweep(curve) => Some(curve),
            _ => None,
        }
    }

    pub fn as_timeline(&self) -> Option<&Timeline> {
        match self {
            SolveOutput::Timeline(timeline) => Some(timeline),
            _ => None,
        }
    }
}
