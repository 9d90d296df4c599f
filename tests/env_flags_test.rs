//! Environment fallbacks for the S3 flags
//!
//! Kept in its own test binary with a single test: the variables are
//! process-wide and would leak into the other flag tests.

use clap::Command;
use s3scope::config::{register_flags, Config};

#[test]
fn test_env_accepts_boolish_values() {
    std::env::set_var("S3_DISABLED", "1");
    std::env::set_var("S3_SECURE", "off");
    std::env::set_var("S3_BUCKET", "from-env");

    let matches = register_flags(Command::new("test"))
        .try_get_matches_from(["test"])
        .unwrap();
    let config = Config::from_arg_matches(&matches).unwrap();

    assert!(config.disabled);
    assert!(!config.secure);
    assert_eq!(config.bucket, "from-env");
    assert!(config.validate().is_ok());

    // Flags still win over the environment
    let matches = register_flags(Command::new("test"))
        .try_get_matches_from(["test", "--s3-bucket", "from-flag"])
        .unwrap();
    assert_eq!(Config::from_arg_matches(&matches).unwrap().bucket, "from-flag");

    std::env::set_var("S3_DISABLED", "no");
    let matches = register_flags(Command::new("test"))
        .try_get_matches_from(["test"])
        .unwrap();
    assert!(!Config::from_arg_matches(&matches).unwrap().disabled);

    for name in ["S3_DISABLED", "S3_SECURE", "S3_BUCKET"] {
        std::env::remove_var(name);
    }
}
