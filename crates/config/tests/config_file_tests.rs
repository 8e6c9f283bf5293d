use std::io::Write;

use scheduler_config::{AppConfig, OutputFormat};

#[test]
fn test_load_from_explicit_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[simulation]
default_strategy = "sjf"

[batch]
simple = 1
medium = 0
complex = 0

[logging]
format = "text"
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load(Some(&path)).unwrap();

    assert_eq!(config.simulation.default_strategy, "sjf");
    assert_eq!(config.batch.total(), 1);
    assert_eq!(config.logging.format, OutputFormat::Text);
    assert_eq!(config.simulation.round_robin.quantum_ms, 100);
}

#[test]
fn test_load_missing_file_fails() {
    let result = AppConfig::load(Some("/definitely/not/here/scheduler.toml"));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("配置文件不存在"));
}

#[test]
fn test_load_rejects_invalid_values() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[simulation.round_robin]
quantum_ms = 5
context_switch_ms = 50
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    assert!(AppConfig::load(Some(&path)).is_err());
}
