//! Simulated training run with an overfitting phase.
//!
//! Training loss keeps falling while validation loss bottoms out and then
//! climbs. The engine latches `stop` once validation drifts far enough above
//! the best training loss, and the gate closes for the rest of the run.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=earlystop_gate_rs=info cargo run --example simulated_run
//! ```

use earlystop_gate_rs::prelude::*;
use tracing_subscriber::EnvFilter;

const STEPS: usize = 400;
const VAL_EVERY: usize = 20;

fn train_loss(step: usize) -> f32 {
    let t = step as f32;
    2.0 / (1.0 + t * 0.02) + 0.1 + (t * 1.7).sin() * 0.02
}

fn val_loss(step: usize) -> f32 {
    let t = step as f32;
    // Minimum around step 150, rising afterwards
    0.45 + ((t - 150.0) / 150.0).powi(2) * 0.6
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("earlystop_gate_rs=info".parse()?),
        )
        .init();

    let config = EarlyStopConfig::new(1.5, 1.0, 20);
    let machine = DecisionMachine::new(config, SharedChannel::new())?;
    let mut layer = EarlyStopLayer::new(machine);
    let mut log = DecisionLog::new(true);
    let mut frozen_steps = 0;

    for step in 1..=STEPS {
        let out = layer.forward(Phase::Train, &[train_loss(step)])?;
        log.record(&out.outcome);

        let mut diff = [0.0];
        if !layer.backward(&mut diff)?.propagates() {
            frozen_steps += 1;
        }

        if step % VAL_EVERY == 0 {
            log.record(&layer.forward(Phase::Validate, &[val_loss(step)])?.outcome);
        }
    }

    println!("{}", log.summary());
    println!("Frozen steps: {frozen_steps} / {STEPS}");

    if let Some(report) = log.reports().iter().find(|r| r.transitioned) {
        println!(
            "Stopped at sample {}: validation {:.4}, minimum {:.4}, comparison {:.4}",
            report.sample_count, report.validation_loss, report.minimum, report.comparison_value
        );
    }

    Ok(())
}
