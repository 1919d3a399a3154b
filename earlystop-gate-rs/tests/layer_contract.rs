//! Layer-style host loop tests

use earlystop_gate_rs::prelude::*;

/// Drives the layer the way a host loop would: one validation pass after
/// every `val_every` training iterations.
fn run_host_loop(
    layer: &mut EarlyStopLayer,
    train: &[f32],
    val: &[f32],
    val_every: usize,
) -> Vec<f32> {
    let mut gates = Vec::with_capacity(train.len());
    let mut val_iter = val.iter();

    for (i, &loss) in train.iter().enumerate() {
        let out = layer.forward(Phase::Train, &[loss]).unwrap();
        assert_eq!(out.value, loss);

        let mut diff = [f32::NAN];
        layer.backward(&mut diff).unwrap();
        gates.push(diff[0]);

        if (i + 1) % val_every == 0 {
            if let Some(&v) = val_iter.next() {
                layer.forward(Phase::Validate, &[v]).unwrap();
            }
        }
    }
    gates
}

#[test]
fn test_gate_closes_after_divergence() {
    let machine =
        DecisionMachine::new(EarlyStopConfig::new(0.1, 1.0, 4), SharedChannel::new()).unwrap();
    let mut layer = EarlyStopLayer::new(machine);

    let train = [
        5.0, 4.0, 3.0, 2.0, // check skipped: no validation yet
        1.0, 1.0, 1.0, 9.0, // validation 3.0 is far above the minimum
        1.0, 1.0, 1.0, 1.0,
    ];
    let gates = run_host_loop(&mut layer, &train, &[3.0, 1.0, 1.0], 4);

    assert_eq!(&gates[..7], &[1.0; 7]);
    assert_eq!(&gates[7..], &[0.0; 5]);
    assert_eq!(layer.machine().state().stopped_at, Some(8));
}

#[test]
fn test_on_validation_trigger_through_layer() {
    let config = EarlyStopConfig::builder(0.1, 1.0, 4)
        .check_trigger(CheckTrigger::OnValidation)
        .build();
    let machine = DecisionMachine::new(config, SharedChannel::new()).unwrap();
    let mut layer = EarlyStopLayer::new(machine);

    for loss in [1.0, 1.0, 1.0, 9.0] {
        let out = layer.forward(Phase::Train, &[loss]).unwrap();
        assert!(matches!(out.outcome, CheckOutcome::NotDue));
    }

    let out = layer.forward(Phase::Validate, &[3.0]).unwrap();
    assert!(out.outcome.transitioned());

    let mut diff = [0.7];
    assert_eq!(layer.backward(&mut diff).unwrap(), GateSignal::Suppress);
    assert_eq!(diff, [0.0]);
}

#[test]
fn test_arity_error_is_fatal_and_leaves_state() {
    let machine =
        DecisionMachine::new(EarlyStopConfig::new(0.1, 1.0, 2), SharedChannel::new()).unwrap();
    let mut layer = EarlyStopLayer::new(machine);

    let err = layer.forward(Phase::Train, &[1.0, 2.0, 3.0]).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(layer.machine().sample_count(), 0);

    let machine = layer.into_machine();
    assert!(machine.history().is_empty());
}
