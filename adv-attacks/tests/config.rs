use adv_attacks::{AttackError, DecisionBoundary, DecisionBoundaryConfig};
use serde_json::{json, Map, Value};

fn hyperparameters(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => panic!("expected an object"),
    }
}

#[test]
fn test_defaults() {
    let config = DecisionBoundaryConfig::default();
    assert_eq!(config.initial_delta, 0.1);
    assert_eq!(config.initial_epsilon, 0.1);
    assert_eq!(config.max_delta_trials, 20);
    assert_eq!(config.max_epsilon_trials, 20);
    assert_eq!(config.max_iterations, 1000);
    assert_eq!(config.max_initialization_trials, 100);
    assert_eq!(config.step_adapt, 0.9);
    assert!(!config.targeted);
    assert!(!config.early_stopping);
    assert_eq!(config.early_stopping_threshold, 1e-4);
    assert_eq!(config.early_stopping_patience, 10);
    assert!(!config.verbose);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_hyperparameters_fills_missing_fields() {
    assert_eq!(
        DecisionBoundaryConfig::from_hyperparameters(&None).unwrap(),
        DecisionBoundaryConfig::default()
    );

    let config = DecisionBoundaryConfig::from_hyperparameters(&hyperparameters(json!({
        "max_iterations": 50,
        "targeted": true,
        "step_adapt": 0.5,
    })))
    .unwrap();
    assert_eq!(config.max_iterations, 50);
    assert!(config.targeted);
    assert_eq!(config.step_adapt, 0.5);
    assert_eq!(config.max_delta_trials, 20);
}

#[test]
fn test_from_hyperparameters_rejects_bad_values() {
    let err = DecisionBoundaryConfig::from_hyperparameters(&hyperparameters(json!({
        "max_iterations": "many",
    })))
    .unwrap_err();
    assert!(err.to_string().contains("Failed to parse hyperparameters"));

    let err = DecisionBoundaryConfig::from_hyperparameters(&hyperparameters(json!({
        "step_adapt": 1.0,
    })))
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AttackError>(),
        Some(AttackError::InvalidConfig(_))
    ));
}

#[test]
fn test_from_json() {
    let config = DecisionBoundaryConfig::from_json(
        r#"{"initial_delta": 0.05, "early_stopping": true, "early_stopping_patience": 3, "seed": 7}"#,
    )
    .unwrap();
    assert_eq!(config.initial_delta, 0.05);
    assert!(config.early_stopping);
    assert_eq!(config.early_stopping_patience, 3);
    assert_eq!(config.seed, 7);

    assert!(DecisionBoundaryConfig::from_json("not json").is_err());
}

#[test]
fn test_query_budget() {
    let config = DecisionBoundaryConfig {
        max_initialization_trials: 10,
        max_iterations: 5,
        max_delta_trials: 3,
        max_epsilon_trials: 3,
        ..Default::default()
    };
    assert_eq!(config.query_budget(), 40);
}

#[test]
fn test_validate() {
    let invalid = [
        DecisionBoundaryConfig {
            step_adapt: 0.0,
            ..Default::default()
        },
        DecisionBoundaryConfig {
            step_adapt: 1.5,
            ..Default::default()
        },
        DecisionBoundaryConfig {
            initial_delta: -0.1,
            ..Default::default()
        },
        DecisionBoundaryConfig {
            initial_epsilon: f32::INFINITY,
            ..Default::default()
        },
        DecisionBoundaryConfig {
            initial_delta: 2e6,
            ..Default::default()
        },
        DecisionBoundaryConfig {
            early_stopping: true,
            early_stopping_patience: 0,
            ..Default::default()
        },
        DecisionBoundaryConfig {
            early_stopping: true,
            early_stopping_threshold: -1.0,
            ..Default::default()
        },
    ];
    for config in invalid {
        assert!(matches!(
            config.validate(),
            Err(AttackError::InvalidConfig(_))
        ));
        assert!(DecisionBoundary::new(config).is_err());
    }

    // Patience only matters when early stopping is on.
    let config = DecisionBoundaryConfig {
        early_stopping_patience: 0,
        ..Default::default()
    };
    assert!(DecisionBoundary::new(config).is_ok());
}

#[test]
fn test_config_round_trips_through_serde() {
    let config = DecisionBoundaryConfig {
        seed: 3,
        ..Default::default()
    };
    let value = serde_json::to_value(&config).unwrap();
    assert_eq!(value["seed"], json!(3));
    let back: DecisionBoundaryConfig = serde_json::from_value(value).unwrap();
    assert_eq!(back, config);
}
