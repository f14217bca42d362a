//! Scenario: unused config keys are reported per binary
//!
//! # Invariant under test
//! The daemon and the client each consume a disjoint set of config keys.
//! A key read by neither is reported (Warn) or refused (Fail); keys read by
//! the *other* binary are reported as unused for this one.
//!
//! All tests are pure in-process; no network required.

use lom_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigScope, UnusedKeyPolicy};

const YAML: &str = r#"
server:
  bind_addr: "127.0.0.1:9292"
search:
  page_size: 25
client:
  api_root: "http://localhost:9292"
legacy:
  plate_reader: true
"#;

#[test]
fn warn_policy_reports_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigScope::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)
            .expect("warn policy must not error");
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/client/api_root".to_string(), "/legacy/plate_reader".to_string()]
    );
    assert_eq!(report.scope, "DAEMON");
}

#[test]
fn client_scope_ignores_daemon_sections() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigScope::Client, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert!(report
        .unused_leaf_pointers
        .contains(&"/server/bind_addr".to_string()));
    assert!(!report
        .unused_leaf_pointers
        .contains(&"/client/api_root".to_string()));
}

#[test]
fn fail_policy_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigScope::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn fully_consumed_config_is_clean() {
    let yaml = r#"
server:
  bind_addr: "0.0.0.0:9000"
transfer:
  require_active_order: false
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report =
        report_unused_keys(ConfigScope::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean());
}
