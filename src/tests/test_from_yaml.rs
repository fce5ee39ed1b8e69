use crate::apf_params::ApfParams;
use crate::parameter_error::ParameterError;

const READ_ERROR: &str = "Failed to load planner parameters from file";

#[test]
fn test_apf_params_from_yaml() {
    let loaded = ApfParams::from_yaml_file("src/tests/data/apf_params.yaml").expect(READ_ERROR);
    let defaults = ApfParams::default();

    assert_eq!(loaded.max_iter, 3000);
    assert_eq!(loaded.safety_distance, 0.2);
    assert_eq!(loaded.min_obstacle_distance, 0.01);
    assert_eq!(loaded.target_zeta, 2.0);
    assert_eq!(loaded.target_alfa, 0.4);
    assert_eq!(loaded.target_err, 0.002);
    assert_eq!(loaded.global_trajectory_att_outer, 0.2);
    assert_eq!(loaded.trajectory_patience, 40);
    assert_eq!(loaded.obs_eta, vec![0.0, 0.001, 0.002, 0.002, 0.003, 0.003]);
    assert_eq!(loaded.obs_alfa, vec![2.0, 2.0, 2.0, 2.0, 1.5, 1.5]);
    assert_eq!(loaded.max_joint_velocity, 0.8);
    assert_eq!(loaded.cycle_period_ms, 10);

    // Not in the file
    assert_eq!(loaded.joint_err, defaults.joint_err);
    assert_eq!(loaded.step_gain, defaults.step_gain);
    assert_eq!(loaded.service_retries, defaults.service_retries);

    loaded.validate(6).expect("Loaded parameters must validate");
}

#[test]
fn test_empty_yaml_gives_defaults() {
    let loaded = ApfParams::from_yaml("{}").expect("Empty mapping is valid");
    assert_eq!(loaded, ApfParams::default());
}

#[test]
fn test_malformed_yaml() {
    let result = ApfParams::from_yaml("max_iter: [1, 2]");
    assert!(matches!(result, Err(ParameterError::ParseError(_))));
}

#[test]
fn test_missing_file() {
    let result = ApfParams::from_yaml_file("src/tests/data/no_such_file.yaml");
    assert!(matches!(result, Err(ParameterError::IoError(_))));
}
