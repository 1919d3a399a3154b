//! End-to-end decision scenarios

use earlystop_gate_rs::prelude::*;

fn shared_machine(threshold: f32, lamina: f32, k: usize) -> (DecisionMachine, SharedChannel) {
    let channel = SharedChannel::new();
    let machine =
        DecisionMachine::new(EarlyStopConfig::new(threshold, lamina, k), channel.clone()).unwrap();
    (machine, channel)
}

#[test]
fn test_improving_run_never_stops() {
    let (mut machine, channel) = shared_machine(0.1, 1.0, 4);
    let mut log = DecisionLog::new(true);

    // Training keeps improving and validation tracks just above it
    for epoch in 0..10 {
        let base = 10.0 / (epoch as f32 + 1.0);
        for step in 0..4 {
            let outcome = machine.observe_training(base - step as f32 * 0.01 * base);
            log.record(&outcome);
        }
        channel.write(base * 0.98).unwrap();
    }

    assert!(!machine.is_stopped());
    assert_eq!(machine.gate(), GateSignal::Propagate);
    // The first scheduled check runs before any validation value exists
    assert_eq!(log.statistics().checks_skipped, 1);
    assert_eq!(log.statistics().checks_evaluated, 9);
}

#[test]
fn test_overfitting_run_stops_and_stays_stopped() {
    let (mut machine, channel) = shared_machine(0.1, 1.0, 4);
    let mut log = DecisionLog::new(true);

    channel.write(3.0).unwrap();
    for loss in [1.0, 1.0, 1.0, 9.0] {
        log.record(&machine.observe_training(loss));
    }
    assert!(machine.is_stopped());
    assert_eq!(log.statistics().stopped_at, Some(4));

    // Validation recovers completely; the gate stays closed
    channel.write(1.0).unwrap();
    for _ in 0..5 {
        for loss in [1.0, 1.0, 1.0, 9.0] {
            log.record(&machine.observe_training(loss));
        }
        assert_eq!(machine.gate().value(), 0.0);
    }

    assert_eq!(machine.state().comparison_value, 0.0);
    assert_eq!(machine.state().stopped_at, Some(4));
    assert_eq!(log.statistics().stopped_at, Some(4));
    assert_eq!(log.statistics().checks_evaluated, 6);
}

#[test]
fn test_checks_use_global_minimum() {
    let (mut machine, channel) = shared_machine(0.1, 1.0, 4);
    channel.write(5.0).unwrap();

    // An early low outlier falls out of the window but not the minimum
    for loss in [0.5, 9.0, 9.0, 9.0, 10.0, 8.0, 6.0, 4.0] {
        machine.observe_training(loss);
    }

    let state = machine.state();
    assert_eq!(state.minimum, 0.5);
    assert_eq!(state.median, 8.0);
    assert_eq!(state.sum_last_k, 28.0);
    assert_eq!(state.checks_performed, 2);
}

#[test]
fn test_lamina_scales_sensitivity() {
    // Same data, comparison 1.0 at lamina 1 and 0.05 at lamina 20
    let mut outcomes = Vec::new();
    for lamina in [1.0, 20.0] {
        let (mut machine, channel) = shared_machine(0.1, lamina, 4);
        channel.write(3.0).unwrap();
        for loss in [1.0, 1.0, 1.0, 9.0] {
            machine.observe_training(loss);
        }
        outcomes.push((machine.state().comparison_value, machine.is_stopped()));
    }

    assert_eq!(outcomes[0], (1.0, true));
    assert_eq!(outcomes[1], (0.05, false));
}

#[test]
fn test_checkpoint_restore_preserves_latched_stop() {
    let (mut machine, channel) = shared_machine(0.1, 1.0, 4);
    channel.write(3.0).unwrap();
    for loss in [1.0, 1.0, 1.0, 9.0, 2.0, 2.0] {
        machine.observe_training(loss);
    }
    assert!(machine.is_stopped());

    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("machine.json");
    machine.checkpoint().save(&path).unwrap();

    let checkpoint = MachineCheckpoint::load(&path).unwrap();
    let mut restored = DecisionMachine::restore(checkpoint, channel).unwrap();

    assert!(restored.is_stopped());
    assert_eq!(restored.sample_count(), 6);
    assert_eq!(restored.history().minimum(), Some(1.0));
    assert_eq!(restored.history().window(), vec![1.0, 9.0, 2.0, 2.0]);
    assert_eq!(restored.state(), machine.state());

    // The next scheduled check lands on sample 8, same as without a restart
    assert!(matches!(restored.observe_training(2.0), CheckOutcome::NotDue));
    assert!(restored.observe_training(2.0).report().is_some());
    assert_eq!(restored.gate(), GateSignal::Suppress);
}

#[test]
fn test_restore_rejects_inconsistent_history() {
    let (machine, channel) = shared_machine(0.1, 1.0, 4);
    let mut checkpoint = machine.checkpoint();
    checkpoint.sample_count = 3;

    let result = DecisionMachine::restore(checkpoint, channel);
    assert!(matches!(result, Err(EarlyStopError::CheckpointError { .. })));
}

#[test]
fn test_decision_log_export() {
    let (mut machine, channel) = shared_machine(0.1, 1.0, 2);
    let mut log = DecisionLog::new(true);

    channel.write(4.0).unwrap();
    for loss in [2.0, 2.0, 3.0, 1.0] {
        log.record(&machine.observe_training(loss));
    }

    let json = log.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["summary"]["checks_evaluated"], 2);
    assert_eq!(value["summary"]["singular_checks"], 1);
    assert_eq!(value["reports"][0]["comparison_value"], "NaN");
    assert_eq!(value["reports"][0]["singularity"], "window_spread");
}
