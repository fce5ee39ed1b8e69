mod test_planner_scenarios;

#[cfg(feature = "allow_filesystem")]
mod test_from_yaml;
