//! Configuration examples.
//!
//! Demonstrates building, validating and persisting engine configurations.

use earlystop_gate_rs::config::{CheckTrigger, EarlyStopConfig, SingularityPolicy};

fn main() {
    println!("=== Early-Stop Configuration Examples ===\n");

    println!("1. Interval-triggered checks:");
    let interval = EarlyStopConfig::new(0.1, 1.0, 50);
    print_config(&interval);

    println!("\n2. Checks after every validation pass:");
    let on_validation = EarlyStopConfig::builder(0.1, 1.0, 50)
        .check_trigger(CheckTrigger::OnValidation)
        .build();
    print_config(&on_validation);

    println!("\n3. IEEE arithmetic on zero denominators:");
    let propagate = EarlyStopConfig::builder(0.5, 2.0, 20)
        .singularity_policy(SingularityPolicy::Propagate)
        .build();
    print_config(&propagate);

    println!("\n4. Parsed from TOML:");
    let toml = r#"
        threshold = 0.25
        lamina = 4.0
        time_interval = 100
        check_trigger = "on_validation"
    "#;
    match EarlyStopConfig::from_toml_str(toml) {
        Ok(config) => print_config(&config),
        Err(e) => println!("  error: {e}"),
    }

    println!("\n5. Rejected configuration:");
    let invalid = EarlyStopConfig::new(0.1, 1.0, 0);
    match invalid.validate() {
        Ok(()) => println!("  unexpectedly valid"),
        Err(e) => println!("  {e}"),
    }
}

fn print_config(config: &EarlyStopConfig) {
    println!("  threshold: {}", config.threshold);
    println!("  lamina: {}", config.lamina);
    println!("  time_interval: {}", config.time_interval);
    println!("  check_trigger: {:?}", config.check_trigger);
    println!("  singularity_policy: {:?}", config.singularity_policy);
}
