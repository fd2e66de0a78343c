//! Behaviour of the batch engines on top of the equilibrium solver.

use approx::assert_relative_eq;
use carbspec_components::sensitivity::SensitivityOutcome;
use carbspec_components::sweep::SweepOutcome;
use carbspec_components::{
    CyclePayload, InputParameter, SensitivityEngine, SensitivitySettings, SweepEngine,
    SweepRange, SweepVariable, TimelineIntegrator,
};
use carbspec_core::errors::FailureKind;
use carbspec_core::{
    Dose, EquilibriumSolver, ModelKind, ModelResources, Reagent, SolubilityInputs,
    SpeciationResult,
};

fn solver() -> EquilibriumSolver {
    EquilibriumSolver::resolve(ModelKind::DebyeHuckelFull, &ModelResources::default()).unwrap()
}

fn inputs(reagent: Reagent, moles: f64) -> SolubilityInputs {
    SolubilityInputs::new(Dose::moles(reagent, moles), 1.0)
}

fn assert_same_solve(actual: &SpeciationResult, expected: &SpeciationResult) {
    assert_eq!(actual.ph, expected.ph);
    assert_eq!(actual.ionic_strength, expected.ionic_strength);
    assert_eq!(actual.diagnostics, expected.diagnostics);
}

mod sensitivity {
    use super::*;

    #[test]
    fn test_zero_baseline_flagged_undefined() {
        let engine = SensitivityEngine::new(solver(), SensitivitySettings::default());
        let table = engine
            .run(&inputs(Reagent::SodiumBicarbonate, 0.01))
            .unwrap();

        // Closed system: no headspace and no uptake at baseline.
        let undefined = table.undefined_parameters();
        assert_eq!(
            undefined,
            vec![InputParameter::HeadspacePco2, InputParameter::Co2Uptake]
        );
        for row in table.rows.iter().filter(|r| r.is_undefined()) {
            assert_eq!(row.baseline_value, 0.0);
        }

        let ranked: Vec<InputParameter> = table.ranking().into_iter().map(|(p, _)| p).collect();
        assert!(!ranked.contains(&InputParameter::HeadspacePco2));
        assert!(!ranked.contains(&InputParameter::Co2Uptake));
        assert!(ranked.contains(&InputParameter::DoseAmount));
    }

    #[test]
    fn test_normalized_sensitivity() {
        let settings = SensitivitySettings {
            parameters: vec![InputParameter::Co2Uptake],
            fraction: 0.01,
        };
        let engine = SensitivityEngine::new(solver(), settings);
        let table = engine
            .run(&inputs(Reagent::SodiumHydroxide, 0.02).with_co2_uptake(0.005))
            .unwrap();

        assert_eq!(table.rows.len(), 2);
        let up = table.rows[0].measure().unwrap();
        let down = table.rows[1].measure().unwrap();

        // More absorbed CO2 acidifies the solution.
        assert!(up.delta_ph < 0.0);
        assert!(down.delta_ph > 0.0);
        assert_relative_eq!(up.normalized_ph, up.delta_ph / 0.01);
        assert_relative_eq!(down.normalized_ph, down.delta_ph / -0.01);
    }

    #[test]
    fn test_failed_row_does_not_abort_others() {
        // A 5 % increase of -262 °C lies below absolute zero and fails validation.
        let inputs = inputs(Reagent::SodiumHydroxide, 0.01).with_temperature(-262.0);
        let settings = SensitivitySettings {
            parameters: vec![InputParameter::Temperature, InputParameter::DoseAmount],
            fraction: 0.05,
        };
        let table = SensitivityEngine::new(solver(), settings)
            .run(&inputs)
            .unwrap();

        assert_eq!(table.rows.len(), 4);
        let failure = table.rows[0].failure().expect("colder row should fail");
        assert_eq!(failure.kind, FailureKind::InvalidInput);
        assert!(matches!(
            table.rows[1].outcome,
            SensitivityOutcome::Computed(_)
        ));
        assert_eq!(table.failed_rows().count(), 1);

        let ranked: Vec<InputParameter> = table.ranking().into_iter().map(|(p, _)| p).collect();
        assert!(ranked.contains(&InputParameter::Temperature));
        assert!(ranked.contains(&InputParameter::DoseAmount));
    }

    #[test]
    fn test_failed_baseline_is_an_error() {
        let mut inputs = inputs(Reagent::SodiumBicarbonate, 0.01);
        inputs.solver.ph_domain = (10.0, 14.0);
        inputs.initial_ph_guess = 12.0;
        let engine = SensitivityEngine::new(solver(), SensitivitySettings::default());
        assert!(engine.run(&inputs).is_err());
    }
}

mod sweep {
    use super::*;

    #[test]
    fn test_order_and_length_preserved_with_failures() {
        let engine = SweepEngine::new(solver());
        let range = SweepRange::new(vec![0.05, 0.01, -1.0, 0.02, 0.005]);
        let curve = engine.run(
            &inputs(Reagent::SodiumBicarbonate, 0.01),
            SweepVariable::Input(InputParameter::DoseAmount),
            &range,
        );

        assert_eq!(curve.len(), range.values.len());
        let values: Vec<f64> = curve.points.iter().map(|p| p.value).collect();
        assert_eq!(values, range.values);

        assert!(curve.points[2].is_failed());
        match &curve.points[2].outcome {
            SweepOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::InvalidInput),
            SweepOutcome::Solved(_) => panic!("negative dose must fail"),
        }
        assert_eq!(curve.failure_count(), 1);
        assert_eq!(curve.ph_series().len(), 4);
    }

    #[test]
    fn test_points_seeded_from_last_converged() {
        let solver = solver();
        let engine = SweepEngine::new(solver.clone());
        let base = inputs(Reagent::SodiumBicarbonate, 0.01);
        let parameter = InputParameter::DoseAmount;
        let curve = engine.run(
            &base,
            SweepVariable::Input(parameter),
            &SweepRange::new(vec![0.01, 0.02, -1.0, 0.03]),
        );

        let seeded_from: Vec<Option<usize>> = curve.points.iter().map(|p| p.seeded_from).collect();
        assert_eq!(seeded_from, vec![None, Some(0), Some(1), Some(1)]);

        // The first point uses the caller's guess.
        let first = solver.solve(&parameter.apply(&base, 0.01)).unwrap();
        assert_same_solve(curve.points[0].result().unwrap(), &first);

        // The point after the failure is seeded from the last converged point.
        let seed = curve.points[1].result().unwrap().seed();
        let last = solver
            .solve_seeded(&parameter.apply(&base, 0.03), Some(seed))
            .unwrap();
        assert_same_solve(curve.points[3].result().unwrap(), &last);
    }

    #[test]
    fn test_forced_ph_points_seeded() {
        let solver = solver();
        let base = inputs(Reagent::SodiumCarbonate, 0.5);
        let curve = SweepEngine::new(solver.clone()).run(
            &base,
            SweepVariable::ForcedPh,
            &SweepRange::new(vec![9.0, 9.5]),
        );

        assert_eq!(curve.points[1].seeded_from, Some(0));
        let seed = curve.points[0].result().unwrap().seed();
        let second = solver.solve_forced_ph_seeded(&base, 9.5, Some(seed)).unwrap();
        let unseeded = solver.solve_forced_ph(&base, 9.5).unwrap();

        let point = curve.points[1].result().unwrap();
        assert_same_solve(point, &second);
        assert_relative_eq!(point.ionic_strength, unseeded.ionic_strength, max_relative = 1e-6);
    }

    #[test]
    fn test_forced_ph_sweep() {
        let engine = SweepEngine::new(solver());
        let curve = engine.run(
            &inputs(Reagent::SodiumBicarbonate, 0.01),
            SweepVariable::ForcedPh,
            &SweepRange::default_ph(),
        );

        assert_eq!(curve.len(), 7);
        let titrants: Vec<f64> = curve
            .points
            .iter()
            .map(|p| p.result().unwrap().titrant_m)
            .collect();
        // Acid below the natural pH of ~8.3, base above it.
        assert!(titrants[0] < 0.0);
        assert!(titrants[6] > 0.0);
        assert!(titrants.windows(2).all(|w| w[1] > w[0]));
    }
}

mod timeline {
    use super::*;

    fn payloads() -> Vec<CyclePayload> {
        vec![
            CyclePayload::new(1, 0.001),
            CyclePayload::new(2, 0.002),
            CyclePayload::new(3, 0.001),
        ]
    }

    #[test]
    fn test_reruns_are_identical() {
        let integrator = TimelineIntegrator::new(solver());
        let base = inputs(Reagent::SodiumHydroxide, 0.02);

        let first = integrator.run(&base, &payloads());
        let second = integrator.run(&base, &payloads());
        assert_eq!(first, second);
    }

    #[test]
    fn test_cumulative_uptake_and_acidification() {
        let integrator = TimelineIntegrator::new(solver());
        let timeline = integrator.run(&inputs(Reagent::SodiumHydroxide, 0.02), &payloads());

        let cumulative: Vec<f64> = timeline
            .entries
            .iter()
            .map(|e| e.cumulative_uptake_mol)
            .collect();
        assert_relative_eq!(cumulative[0], 0.001);
        assert_relative_eq!(cumulative[1], 0.003);
        assert_relative_eq!(cumulative[2], 0.004);

        let ph: Vec<f64> = timeline
            .entries
            .iter()
            .map(|e| e.result().unwrap().ph)
            .collect();
        assert!(ph.windows(2).all(|w| w[1] < w[0]));

        let ledger = timeline.final_ledger().unwrap();
        assert_relative_eq!(ledger.co2_to_carbonate, 0.004);
        assert_relative_eq!(ledger.sodium_hydroxide, 0.012, epsilon = 1e-15);
    }

    #[test]
    fn test_inserting_early_cycle_shifts_later_entries() {
        let integrator = TimelineIntegrator::new(solver());
        let base = inputs(Reagent::SodiumHydroxide, 0.02);
        let original = integrator.run(&base, &payloads());

        let mut edited = vec![CyclePayload::new(0, 0.0005)];
        edited.extend(payloads());
        let edited = integrator.run(&base, &edited);

        assert_eq!(edited.entries.len(), original.entries.len() + 1);
        for (before, after) in original.entries.iter().zip(&edited.entries[1..]) {
            assert_eq!(before.cycle_index, after.cycle_index);
            assert_relative_eq!(
                after.cumulative_uptake_mol,
                before.cumulative_uptake_mol + 0.0005,
                epsilon = 1e-15
            );
            assert!(after.result().unwrap().ph < before.result().unwrap().ph);
        }
    }

    #[test]
    fn test_rejected_payload_contributes_nothing() {
        let integrator = TimelineIntegrator::new(solver());
        let payloads = vec![
            CyclePayload::new(1, 0.001),
            CyclePayload::new(2, -0.5),
            CyclePayload::new(3, 0.001),
        ];
        let timeline = integrator.run(&inputs(Reagent::SodiumHydroxide, 0.02), &payloads);

        assert_eq!(timeline.rejected_payloads(), vec![1]);
        assert_eq!(
            timeline.entries[1].cumulative_uptake_mol,
            timeline.entries[0].cumulative_uptake_mol
        );
        assert!(timeline.entries[1].result().is_some());
        assert_relative_eq!(timeline.entries[2].cumulative_uptake_mol, 0.002);
    }

    #[test]
    fn test_cycles_seeded_from_last_converged() {
        let solver = solver();
        let integrator = TimelineIntegrator::new(solver.clone());
        let base = inputs(Reagent::SodiumHydroxide, 0.02);
        // Accepted, but the temperature fails validation in the solve.
        let payloads = vec![
            CyclePayload::new(1, 0.001),
            CyclePayload::new(2, 0.001).with_temperature(-300.0),
            CyclePayload::new(3, 0.001),
        ];
        let timeline = integrator.run(&base, &payloads);

        assert!(timeline.entries[0].result().is_some());
        assert!(timeline.entries[1].result().is_none());
        let seeded_from: Vec<Option<usize>> =
            timeline.entries.iter().map(|e| e.seeded_from).collect();
        assert_eq!(seeded_from, vec![None, Some(0), Some(0)]);

        let seed = timeline.entries[0].result().unwrap().seed();
        let expected = solver
            .solve_seeded(&base.clone().with_co2_uptake(0.003), Some(seed))
            .unwrap();
        assert_same_solve(timeline.entries[2].result().unwrap(), &expected);
    }

    #[test]
    fn test_cycle_temperature_applied() {
        let integrator = TimelineIntegrator::new(solver());
        let payloads = vec![CyclePayload::new(1, 0.001).with_temperature(40.0)];
        let timeline = integrator.run(&inputs(Reagent::SodiumHydroxide, 0.02), &payloads);
        assert_eq!(timeline.entries[0].temperature_c, 40.0);
    }
}
