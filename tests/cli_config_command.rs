//! Integration tests for the `routestat config` template
//!
//! Verifies the generated template loads as a valid configuration file.

use routestat::cli::generate_config_template;
use routestat::config::Config;
use std::fs;
use tempfile::TempDir;

fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

#[test]
fn test_generated_template_creates_valid_config_file() {
    let temp_dir = create_temp_dir();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, generate_config_template()).expect("Failed to write template");

    let config =
        Config::from_file(&config_path).expect("Generated template should load as valid Config");

    assert_eq!(config.bind_address(), "0.0.0.0:3000");
    assert_eq!(config.metrics.namespace(), "routestat");
    assert_eq!(config.tracing.service_name, "routestat");
    assert_eq!(config.observability.log_level, "info");
}

#[test]
fn test_template_has_all_sections() {
    let template = generate_config_template();

    for section in ["[server]", "[metrics]", "[tracing]", "[observability]"] {
        assert!(template.contains(section), "Missing {}", section);
    }
}

#[test]
fn test_edited_template_is_revalidated() {
    let temp_dir = create_temp_dir();
    let config_path = temp_dir.path().join("config.toml");

    let edited = generate_config_template().replace(
        "namespace = \"routestat\"",
        "namespace = \"9-bad-namespace\"",
    );
    fs::write(&config_path, edited).expect("Failed to write template");

    let err = Config::from_file(&config_path).expect_err("invalid namespace should fail");
    assert!(err.to_string().contains("metrics.namespace"), "{}", err);
    assert!(err.to_string().contains("config.toml"), "error names the file: {}", err);
}
