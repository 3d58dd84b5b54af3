//! Coverage for config parsing, overrides, validation, and path resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toleration_defaults::admission::plugin::DecodeErrorPolicy;
use toleration_defaults::api::pod::TolerationStorage;
use toleration_defaults::config::{
    load_config, load_effective, resolve_config_path, Config, ConfigError, CONFIG_PATH_ENV,
};
use toleration_defaults::reconciler::GracePeriods;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

fn no_env(_key: &str) -> Option<String> {
    None
}

#[test]
fn defaults_match_api_server_flags() {
    let config = Config::default();
    assert_eq!(config.admission.default_not_ready_toleration_seconds, 300);
    assert_eq!(config.admission.default_unreachable_toleration_seconds, 300);
    assert_eq!(config.admission.tolerations_storage, TolerationStorage::Spec);
    assert_eq!(config.admission.on_decode_error, DecodeErrorPolicy::Reject);
    assert_eq!(config.server.listen_addr, "0.0.0.0:8443");
    assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(30));
    assert!(config.logging.logs_dir.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn empty_file_is_valid() {
    let config = Config::from_toml("").expect("empty config should parse");
    assert_eq!(config, Config::default());
}

#[test]
fn parse_complete_config() {
    let toml_str = r#"
[admission]
default_not_ready_toleration_seconds = 120
default_unreachable_toleration_seconds = 600
tolerations_storage = "annotation"
on_decode_error = "allow"

[server]
listen_addr = "127.0.0.1:9443"
shutdown_timeout_secs = 5

[logging]
logs_dir = "/var/log/toleration-defaults"
"#;
    let config = Config::from_toml(toml_str).expect("config should parse");

    assert_eq!(
        config.admission.grace_periods(),
        GracePeriods {
            not_ready: 120,
            unreachable: 600
        }
    );
    assert_eq!(config.admission.tolerations_storage, TolerationStorage::Annotation);
    assert_eq!(config.admission.on_decode_error, DecodeErrorPolicy::Allow);
    assert_eq!(config.server.listen_addr, "127.0.0.1:9443");
    assert_eq!(config.server.shutdown_timeout_secs, 5);
    assert_eq!(
        config.logging.logs_dir.as_deref(),
        Some(Path::new("/var/log/toleration-defaults"))
    );
    assert!(config.validate().is_ok());
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = Config::from_toml("[admission]\ndefault_unreachable_toleration_seconds = 60\n")
        .expect("config should parse");
    assert_eq!(config.admission.default_not_ready_toleration_seconds, 300);
    assert_eq!(config.admission.default_unreachable_toleration_seconds, 60);
}

#[test]
fn unknown_storage_is_a_parse_error() {
    assert!(Config::from_toml("[admission]\ntolerations_storage = \"status\"\n").is_err());
}

#[test]
fn zero_grace_period_is_rejected() {
    let mut config = Config::default();
    config.admission.default_not_ready_toleration_seconds = 0;
    let err = config.validate().expect_err("should fail");

    assert!(matches!(
        err,
        ConfigError::InvalidGracePeriod {
            field: "admission.default_not_ready_toleration_seconds",
            value: 0
        }
    ));
}

#[test]
fn negative_grace_period_is_rejected() {
    let mut config = Config::default();
    config.admission.default_unreachable_toleration_seconds = -5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidGracePeriod { value: -5, .. })
    ));
}

#[test]
fn bad_listen_addr_is_rejected() {
    let mut config = Config::default();
    config.server.listen_addr = "localhost".to_owned();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidListenAddr(_))
    ));
}

// ---------- overrides ----------

#[test]
fn env_overrides_apply() {
    let mut config = Config::default();
    config.apply_overrides(env_from(&[
        ("TOLERATION_DEFAULTS_NOT_READY_SECONDS", "30"),
        ("TOLERATION_DEFAULTS_UNREACHABLE_SECONDS", "45"),
        ("TOLERATION_DEFAULTS_LISTEN_ADDR", "127.0.0.1:8080"),
    ]));

    assert_eq!(config.admission.grace_periods(), GracePeriods { not_ready: 30, unreachable: 45 });
    assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn invalid_env_override_is_ignored() {
    let mut config = Config::default();
    config.apply_overrides(env_from(&[("TOLERATION_DEFAULTS_NOT_READY_SECONDS", "soon")]));
    assert_eq!(config.admission.default_not_ready_toleration_seconds, 300);
}

// ---------- paths and loading ----------

#[test]
fn explicit_path_wins() {
    let env = env_from(&[(CONFIG_PATH_ENV, "/etc/from-env.toml")]);
    let (path, requested) = resolve_config_path(Some(Path::new("/etc/flag.toml")), env);
    assert_eq!(path, PathBuf::from("/etc/flag.toml"));
    assert!(requested);
}

#[test]
fn env_path_beats_default() {
    let env = env_from(&[(CONFIG_PATH_ENV, "/etc/from-env.toml")]);
    let (path, requested) = resolve_config_path(None, env);
    assert_eq!(path, PathBuf::from("/etc/from-env.toml"));
    assert!(requested);
}

#[test]
fn default_path_is_not_requested() {
    let (path, requested) = resolve_config_path(None, no_env);
    assert_eq!(path, PathBuf::from("toleration-defaults.toml"));
    assert!(!requested);
}

#[test]
fn load_config_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("toleration-defaults.toml");
    std::fs::write(&path, "[admission]\ndefault_not_ready_toleration_seconds = 90\n")
        .expect("write");

    let config = load_config(&path).expect("load");
    assert_eq!(config.admission.default_not_ready_toleration_seconds, 90);
}

#[test]
fn load_config_reports_parse_errors_with_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[admission\n").expect("write");

    let err = load_config(&path).expect_err("should fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn requested_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing.toml");

    let err = load_effective(Some(path.as_path()), no_env).expect_err("should fail");
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn load_effective_applies_overrides_then_validates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[admission]\ndefault_not_ready_toleration_seconds = 90\n")
        .expect("write");

    let config = load_effective(
        Some(path.as_path()),
        env_from(&[("TOLERATION_DEFAULTS_UNREACHABLE_SECONDS", "15")]),
    )
    .expect("load");
    assert_eq!(config.admission.grace_periods(), GracePeriods { not_ready: 90, unreachable: 15 });

    let err = load_effective(
        Some(path.as_path()),
        env_from(&[("TOLERATION_DEFAULTS_UNREACHABLE_SECONDS", "0")]),
    )
    .expect_err("should fail validation");
    assert!(matches!(err, ConfigError::InvalidGracePeriod { .. }));
}

#[test]
fn admission_section_builds_matching_plugin() {
    let config = Config::from_toml(
        "[admission]\ndefault_not_ready_toleration_seconds = 10\ndefault_unreachable_toleration_seconds = 20\n",
    )
    .expect("parse");
    let plugin = config.admission.plugin();
    assert_eq!(
        plugin.reconciler().grace_periods(),
        GracePeriods { not_ready: 10, unreachable: 20 }
    );
}
