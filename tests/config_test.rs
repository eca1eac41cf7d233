use std::io::Write as _;
use std::time::Duration;

use sciworker::config::{Config, OverflowPolicy, WorkerConfig};
use sciworker::error::Error;
use serial_test::serial;

fn clear_env() {
    unsafe {
        std::env::remove_var("LOG_LEVEL");
        std::env::remove_var("OTEL_ENDPOINT");
        std::env::remove_var("SCIWORKER_CONFIG");
        std::env::remove_var("SCIWORKER_POLL_INTERVAL_MS");
    }
}

#[test]
#[serial]
fn config_from_env_uses_defaults() {
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
    assert!(config.worker_config_path.is_none());
    assert_eq!(config.worker_config().unwrap(), WorkerConfig::default());
}

#[test]
#[serial]
fn config_from_env_reads_overrides() {
    clear_env();
    unsafe {
        std::env::set_var("LOG_LEVEL", "debug");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        std::env::set_var("SCIWORKER_POLL_INTERVAL_MS", "25");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(
        config.worker_config().unwrap().poll_interval(),
        Duration::from_millis(25)
    );

    clear_env();
}

#[test]
#[serial]
fn config_from_env_rejects_bad_poll_interval() {
    clear_env();
    for bad in ["0", "-5", "soon"] {
        unsafe {
            std::env::set_var("SCIWORKER_POLL_INTERVAL_MS", bad);
        }
        assert!(matches!(Config::from_env(), Err(Error::Config(_))), "{bad}");
    }
    clear_env();
}

#[test]
#[serial]
fn worker_config_file_is_loaded_and_overridden() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
poll_interval_ms = 50
input_capacity = 8
oneshot = true

[overflow]
policy = "block"
block_timeout_ms = 250
"#
    )
    .unwrap();

    unsafe {
        std::env::set_var("SCIWORKER_CONFIG", file.path());
    }
    let worker = Config::from_env().unwrap().worker_config().unwrap();
    assert_eq!(worker.poll_interval_ms, 50);
    assert_eq!(worker.input_capacity, Some(8));
    assert_eq!(
        worker.overflow,
        OverflowPolicy::Block {
            block_timeout_ms: 250
        }
    );
    assert!(worker.oneshot);
    assert!(worker.report_faults);

    unsafe {
        std::env::set_var("SCIWORKER_POLL_INTERVAL_MS", "5");
    }
    let worker = Config::from_env().unwrap().worker_config().unwrap();
    assert_eq!(worker.poll_interval_ms, 5);
    assert_eq!(worker.input_capacity, Some(8));

    clear_env();
}

#[test]
#[serial]
fn missing_worker_config_file_is_a_config_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("SCIWORKER_CONFIG", dir.path().join("absent.toml"));
    }
    let result = Config::from_env().unwrap().worker_config();
    assert!(matches!(result, Err(Error::Config(_))));
    clear_env();
}

#[test]
fn worker_config_rejects_invalid_values() {
    assert!(WorkerConfig::from_toml_str("poll_interval_ms = 0").is_err());
    assert!(WorkerConfig::from_toml_str("input_capacity = 0").is_err());
    assert!(WorkerConfig::from_toml_str("poll_intervall_ms = 10").is_err());
    assert!(WorkerConfig::from_toml_str("[overflow]\npolicy = \"drop_newest\"").is_err());

    let config = WorkerConfig::from_toml_str("[overflow]\npolicy = \"drop_oldest\"").unwrap();
    assert_eq!(config.overflow, OverflowPolicy::DropOldest);
    assert_eq!(config.poll_interval(), Duration::from_millis(100));
}
