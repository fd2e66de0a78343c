use carbspec::carbspec_components::{
    CyclePayload, SweepEngine, SweepRange, SweepVariable, TimelineIntegrator,
};
use carbspec::carbspec_core::errors::FailureKind;
use carbspec::carbspec_core::{
    Dose, EquilibriumSolver, ModelKind, ModelResources, Reagent, SolubilityInputs, SolveFailure,
};
use carbspec::{ScheduleError, SolveScheduler, SolveSettings, Workload};
use std::sync::mpsc;

fn solver() -> EquilibriumSolver {
    EquilibriumSolver::resolve(ModelKind::DebyeHuckelFull, &ModelResources::default()).unwrap()
}

fn bicarbonate(moles: f64) -> SolubilityInputs {
    SolubilityInputs::new(Dose::moles(Reagent::SodiumBicarbonate, moles), 1.0)
}

#[test]
fn test_latest_submission_wins() {
    let scheduler = SolveScheduler::new(2).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let first = Workload::single(solver(), bicarbonate(0.01));
    let stale = scheduler.submit("scenario", move || {
        // Held until the newer submission has finished.
        release_rx.recv().ok();
        first.run()
    });

    let second = Workload::single(solver(), bicarbonate(0.05));
    let latest = scheduler.submit("scenario", move || {
        let output = second.run();
        done_tx.send(()).ok();
        output
    });
    assert!(!scheduler.is_latest(&stale));
    assert!(scheduler.is_latest(&latest));

    done_rx.recv().unwrap();
    release_tx.send(()).unwrap();
    scheduler.wait_idle();

    let deliveries = scheduler.drain();
    assert_eq!(deliveries.len(), 1);
    let delivery = &deliveries[0];
    assert_eq!(delivery.key, "scenario");
    assert_eq!(delivery.generation, latest.generation);

    let expected = solver().solve(&bicarbonate(0.05)).unwrap();
    let output = delivery.outcome.as_ref().unwrap();
    assert_eq!(output.as_single().unwrap().ph, expected.ph);
}

#[test]
fn test_resubmission_discards_undrained_result() {
    let scheduler = SolveScheduler::new(1).unwrap();
    scheduler.submit_workload("key", Workload::single(solver(), bicarbonate(0.01)));
    scheduler.wait_idle();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    let workload = Workload::single(solver(), bicarbonate(0.02));
    let latest = scheduler.submit("key", move || {
        release_rx.recv().ok();
        workload.run()
    });
    assert!(scheduler.drain().is_empty());

    release_tx.send(()).unwrap();
    scheduler.wait_idle();
    let delivery = scheduler.take("key").unwrap();
    assert_eq!(delivery.generation, latest.generation);
    assert!(delivery.outcome.is_ok());
}

#[test]
fn test_panic_delivered_as_failure() {
    let scheduler = SolveScheduler::new(1).unwrap();
    scheduler.submit("broken", || panic!("solver exploded"));
    scheduler.submit_workload("fine", Workload::single(solver(), bicarbonate(0.01)));
    scheduler.wait_idle();

    let deliveries = scheduler.drain();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].key, "broken");
    match &deliveries[0].outcome {
        Err(ScheduleError::WorkloadPanicked(message)) => {
            assert!(message.contains("solver exploded"))
        }
        other => panic!("expected a panic failure, got {other:?}"),
    }
    assert_eq!(deliveries[1].key, "fine");
    assert!(deliveries[1].outcome.is_ok());
}

#[test]
fn test_solve_error_delivered() {
    let scheduler = SolveScheduler::new(1).unwrap();
    let mut inputs = bicarbonate(0.01);
    inputs.temperature_c = f64::NAN;
    scheduler.submit_workload("invalid", Workload::single(solver(), inputs));
    scheduler.wait_idle();

    let delivery = scheduler.take("invalid").unwrap();
    match delivery.outcome {
        Err(ScheduleError::Solve(error)) => {
            assert_eq!(SolveFailure::from(error).kind, FailureKind::InvalidInput)
        }
        other => panic!("expected a solve failure, got {other:?}"),
    }
}

#[test]
fn test_batch_workloads() {
    let scheduler = SolveScheduler::new(2).unwrap();
    let base = SolubilityInputs::new(Dose::moles(Reagent::SodiumHydroxide, 0.02), 1.0);
    scheduler.submit_workload(
        "sweep",
        Workload::sweep(
            SweepEngine::new(solver()),
            base.clone(),
            SweepVariable::ForcedPh,
            SweepRange::default_ph(),
        ),
    );
    scheduler.submit_workload(
        "timeline",
        Workload::timeline(
            TimelineIntegrator::new(solver()),
            base,
            vec![CyclePayload::new(1, 0.001), CyclePayload::new(2, 0.002)],
        ),
    );
    scheduler.wait_idle();

    let deliveries = scheduler.drain();
    let curve = deliveries[0].outcome.as_ref().unwrap().as_sweep().unwrap();
    assert_eq!(curve.len(), 7);
    let timeline = deliveries[1]
        .outcome
        .as_ref()
        .unwrap()
        .as_timeline()
        .unwrap();
    assert_eq!(timeline.entries.len(), 2);
}

mod settings {
    use super::*;
    use carbspec::SettingsError;
    use std::io::Write;

    #[test]
    fn test_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model": "debye_huckel_capped", "worker_threads": 2, "sensitivity": {{"fraction": 0.02}}}}"#
        )
        .unwrap();

        let settings = SolveSettings::from_path(file.path()).unwrap();
        assert_eq!(settings.model, ModelKind::DebyeHuckelCapped);
        assert_eq!(settings.worker_threads, 2);
        assert_eq!(settings.sensitivity.fraction, 0.02);

        let solver = settings.solver().unwrap();
        let inputs = settings.apply(&bicarbonate(0.01));
        let result = solver.solve(&inputs).unwrap();
        assert!(result.ph > 8.0 && result.ph < 9.0);
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("settings.json");
        assert_eq!(
            SolveSettings::load_or_default(&missing),
            SolveSettings::default()
        );

        let malformed = dir.path().join("malformed.json");
        std::fs::write(&malformed, "{ not json").unwrap();
        assert_eq!(
            SolveSettings::load_or_default(&malformed),
            SolveSettings::default()
        );
        assert!(matches!(
            SolveSettings::from_path(&malformed),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            SolveSettings::from_path(&missing),
            Err(SettingsError::Read { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let settings = SolveSettings {
            model: ModelKind::Davies,
            worker_threads: 4,
            ..Default::default()
        };
        let json = settings.to_json_string().unwrap();
        assert_eq!(SolveSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_missing_pitzer_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SolveSettings {
            model: ModelKind::ExternalPitzerHmw,
            pitzer_path: Some(dir.path().join("pitzer.dat")),
            ..Default::default()
        };
        assert!(settings.solver().is_err());

        settings.fallback_to_default_model = true;
        let solver = settings.solver().unwrap();
        assert_eq!(solver.requested_model(), ModelKind::ExternalPitzerHmw);
        assert!(solver.fallback_warning().is_some());

        let result = solver.solve(&settings.apply(&bicarbonate(0.01))).unwrap();
        assert!(!result.warnings.is_empty());
    }
}
