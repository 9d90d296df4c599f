use clap::{Command, Parser};
use s3scope::config::{
    load_config, load_from_yaml, mark_required_flags, register_flags, Config, ConfigError, S3Args,
};
use s3scope::s3::NamespaceKind;
use std::fs;
use tempfile::TempDir;

#[derive(Parser)]
struct TestCli {
    #[command(flatten)]
    s3: S3Args,
}

fn flag_args() -> S3Args {
    TestCli::try_parse_from([
        "test",
        "--s3-endpoint",
        "localhost:9000",
        "--s3-bucket",
        "from-flags",
        "--s3-access-key",
        "key",
        "--s3-secret-key",
        "secret",
    ])
    .unwrap()
    .s3
}

/// Test loading configuration from a YAML file
#[test]
fn test_load_yaml_config() {
    let yaml = r#"
endpoint: minio.internal:9000
secure: false
region: us-west-2
bucket: artifacts
access_key: AKIATEST
secret_key: secrettest
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = load_from_yaml(&config_path).unwrap();

    assert_eq!(config.endpoint, "minio.internal:9000");
    assert!(!config.secure);
    assert_eq!(config.region, "us-west-2");
    assert_eq!(config.bucket, "artifacts");
    assert_eq!(config.access_key, "AKIATEST");
    assert_eq!(config.secret_key, "secrettest");
    assert_eq!(config.namespace, NamespaceKind::Bucket);
    assert!(config.validate().is_ok());
}

/// Test that a disabled document needs nothing else
#[test]
fn test_load_yaml_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "disabled: true\n").unwrap();

    let config = load_from_yaml(&config_path).unwrap();
    assert!(config.disabled);
    assert!(config.validate().is_ok());
    assert!(config.to_client_options("test").disabled);
}

/// Test that an incomplete document reports the first missing field
#[test]
fn test_load_yaml_incomplete() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "endpoint: localhost:9000\nbucket: b\n").unwrap();

    let config = load_from_yaml(&config_path).unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err, ConfigError::AccessKeyRequired);
    assert_eq!(err.field(), Some("access_key"));
}

/// Test loading from a missing file
#[test]
fn test_load_yaml_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_from_yaml(temp_dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

/// Test that a config path takes precedence over flags
#[test]
fn test_load_config_prefers_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        "endpoint: s3.example.com\nprefix: tenant-\nnamespace: prefix\naccess_key: a\nsecret_key: s\n",
    )
    .unwrap();

    let args = flag_args();

    let from_file = load_config(Some(&config_path), &args).unwrap();
    assert_eq!(from_file.endpoint, "s3.example.com");
    assert_eq!(from_file.bucket, "tenant-");
    assert_eq!(from_file.namespace, NamespaceKind::Prefix);

    let from_flags = load_config(None, &args).unwrap();
    assert_eq!(from_flags.endpoint, "localhost:9000");
    assert_eq!(from_flags.bucket, "from-flags");
    assert_eq!(from_flags.region, "auto");
    assert!(from_flags.secure);
    assert!(from_flags.validate().is_ok());
}

/// Test the builder-style registration path
#[test]
fn test_register_and_require_flags() {
    let cmd = mark_required_flags(register_flags(Command::new("test"))).unwrap();

    let err = cmd
        .clone()
        .try_get_matches_from(["test", "--s3-endpoint", "localhost:9000"])
        .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

    let matches = cmd
        .try_get_matches_from([
            "test",
            "--s3-endpoint",
            "localhost:9000",
            "--s3-bucket",
            "b",
            "--s3-access-key",
            "a",
            "--s3-secret-key",
            "s",
        ])
        .unwrap();
    let config = Config::from_arg_matches(&matches).unwrap();
    assert!(config.validate().is_ok());
}

/// Test requiring flags on a command that never registered them
#[test]
fn test_require_unregistered_flags() {
    let err = mark_required_flags(Command::new("test")).unwrap_err();
    assert_eq!(err, ConfigError::FlagNotRegistered("s3-endpoint".to_string()));
}
