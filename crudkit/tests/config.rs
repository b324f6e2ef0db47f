use std::fs;
use std::path::Path;

use crudkit::config::PROFILE_ENV;
use crudkit::prelude::*;
use crudkit_data::record;
use serial_test::serial;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
#[serial]
fn test_profile_file_overrides_base() {
    std::env::remove_var(PROFILE_ENV);
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "application.yaml",
        "data:\n  provider:\n    type: rest\n    config:\n      base_url: http://localhost:3000\n      timeout_ms: 1000\nengine:\n  enable_audit: false\n",
    );
    write(
        dir.path(),
        "application-prod.yaml",
        "data:\n  provider:\n    config:\n      base_url: https://api.example.com\nengine:\n  enable_audit: true\n",
    );

    let config = CrudConfig::load_from_dir(dir.path(), "prod").unwrap();

    assert_eq!(config.profile(), "prod");
    let spec = config.provider_spec().unwrap();
    assert_eq!(spec.kind, "rest");
    assert_eq!(spec.config["base_url"], "https://api.example.com");
    assert_eq!(spec.config["timeout_ms"], 1000);
    assert!(config.engine_settings().unwrap().enable_audit);
}

#[test]
#[serial]
fn test_profile_env_var_wins_over_argument() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "application.yaml", "app:\n  name: base\n");
    write(dir.path(), "application-staging.yaml", "app:\n  name: staging\n");

    std::env::set_var(PROFILE_ENV, "staging");
    let config = CrudConfig::load_from_dir(dir.path(), "prod");
    std::env::remove_var(PROFILE_ENV);

    let config = config.unwrap();
    assert_eq!(config.profile(), "staging");
    assert_eq!(config.get::<String>("app.name").unwrap(), "staging");
}

#[test]
#[serial]
fn test_default_profile_is_dev() {
    std::env::remove_var(PROFILE_ENV);
    let dir = tempfile::tempdir().unwrap();
    let config = CrudConfig::load_from_dir(dir.path(), "").unwrap();
    assert_eq!(config.profile(), "dev");
    assert!(!config.contains("data.provider"));
}

#[test]
#[serial]
fn test_dotenv_feeds_placeholders_without_overriding() {
    std::env::remove_var(PROFILE_ENV);
    std::env::remove_var("CRUDKIT_IT_TOKEN");
    std::env::set_var("CRUDKIT_IT_HOST", "from-process");
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), ".env", "CRUDKIT_IT_TOKEN=from-dotenv\nCRUDKIT_IT_HOST=from-dotenv\n");
    write(
        dir.path(),
        "application.yaml",
        "data:\n  provider:\n    type: rest\n    config:\n      base_url: http://${CRUDKIT_IT_HOST}\n      auth: { type: bearer, token: \"${env:CRUDKIT_IT_TOKEN}\" }\n",
    );

    let config = CrudConfig::load_from_dir(dir.path(), "dev");
    std::env::remove_var("CRUDKIT_IT_TOKEN");
    std::env::remove_var("CRUDKIT_IT_HOST");

    let spec = config.unwrap().provider_spec().unwrap();
    assert_eq!(spec.config["base_url"], "http://from-process");
    assert_eq!(spec.config["auth"]["token"], "from-dotenv");
}

#[test]
#[serial]
fn test_unresolved_placeholder_fails_loading() {
    std::env::remove_var(PROFILE_ENV);
    std::env::remove_var("CRUDKIT_IT_NOPE");
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "application.yaml", "secret: ${CRUDKIT_IT_NOPE}\n");

    let err = CrudConfig::load_from_dir(dir.path(), "dev").unwrap_err();
    assert!(matches!(err, ConfigError::Unresolved(ref name) if name == "CRUDKIT_IT_NOPE"));
}

#[test]
fn test_malformed_yaml_is_a_load_error() {
    let err = CrudConfig::from_yaml_str("data: [unclosed", "test").unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[tokio::test]
async fn test_engine_from_yaml_runs_plugins() {
    let config = CrudConfig::from_yaml_str(
        r#"
data:
  provider:
    type: memory
    config:
      seed:
        tasks:
          - { id: 1, title: "plan", done: false }
engine:
  enable_permissions: true
  permissions:
    roles:
      viewer: { tasks: [getList, getOne] }
"#,
        "test",
    )
    .unwrap();
    let engine = config.build_engine().unwrap();

    let listed = engine
        .get_list(ListParams::new("tasks").with_meta("role", "viewer"))
        .await
        .unwrap();
    assert_eq!(listed.data, vec![record! { "id": 1, "title": "plan", "done": false }]);

    let denied = engine
        .create(CreateParams::new("tasks", record! { "title": "ship" }).with_meta("role", "viewer"))
        .await
        .unwrap_err();
    assert!(matches!(denied, DataError::PermissionDenied { .. }));
}
