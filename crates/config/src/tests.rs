use std::io::Write;

use crate::AppConfig;

#[test]
fn test_environment_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[simulation]
default_strategy = "fcfs"

[batch]
simple = 1
"#
    )
    .unwrap();

    std::env::set_var("SCHEDULER_SIMULATION__DEFAULT_STRATEGY", "round_robin");
    std::env::set_var("SCHEDULER_BATCH__SIMPLE", "7");

    let path = file.path().to_str().unwrap().to_string();
    let loaded = AppConfig::load(Some(&path));

    std::env::remove_var("SCHEDULER_SIMULATION__DEFAULT_STRATEGY");
    std::env::remove_var("SCHEDULER_BATCH__SIMPLE");

    let config = loaded.unwrap();
    assert_eq!(config.simulation.default_strategy, "round_robin");
    assert_eq!(config.batch.simple, 7);
    // 未覆盖的字段保持默认值
    assert_eq!(config.batch.medium, 2);
}
