//! Config Integration Tests
//!
//! Config file round trips and the path from stored settings to the
//! selected model.

use std::fs;

use contract_sentinel::commands::config::{load_config, SettingsArgs};
use contract_sentinel::{AppConfig, AppError, AppState, ConfigService, SettingsUpdate};
use sentinel_llm::{
    EngineBackend, ModelVariant, RuntimeCapabilities, VariantPreference, DEFAULT_FULL_MODEL,
};
use tempfile::TempDir;

#[test]
fn test_partial_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"engine": {"backend": "openai_compatible", "base_url": "http://127.0.0.1:8000/v1"}}"#,
    )
    .unwrap();

    let service = ConfigService::open(path).unwrap();
    let config = service.get_config();
    assert_eq!(config.engine.backend, EngineBackend::OpenaiCompatible);
    assert_eq!(config.engine.resolved_base_url(), "http://127.0.0.1:8000/v1");
    assert_eq!(config.engine.models.full, DEFAULT_FULL_MODEL);
    assert_eq!(config.progress_interval_ms, 200);
    assert_eq!(config.analysis_temperature, 0.2);
}

#[test]
fn test_update_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut service = ConfigService::open(path.clone()).unwrap();
    service
        .update_config(SettingsUpdate {
            full_model: Some("llama3.2:3b".to_string()),
            variant: Some(VariantPreference::Full),
            ..Default::default()
        })
        .unwrap();

    let reopened = ConfigService::open(path).unwrap();
    assert_eq!(reopened.get_config().engine.models.full, "llama3.2:3b");
    assert_eq!(reopened.get_config().engine.variant, VariantPreference::Full);
}

#[test]
fn test_overrides_select_model() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let overrides = SettingsArgs {
        variant: Some(VariantPreference::Full),
        full_model: Some("llama3.2:3b".to_string()),
        ..Default::default()
    };
    let config = load_config(Some(path), overrides).unwrap();
    let state = AppState::from_config(config).unwrap();

    assert_eq!(state.variant(), ModelVariant::Full);
    assert_eq!(state.model_id(), "llama3.2:3b");
}

#[test]
fn test_auto_variant_follows_capabilities() {
    let mut config = AppConfig::default();
    config.engine.variant = VariantPreference::Auto;

    let constrained = RuntimeCapabilities {
        os: "android",
        ..RuntimeCapabilities::detect()
    };
    let state = AppState::from_config(config.clone()).unwrap();
    let expected = if RuntimeCapabilities::detect().is_constrained() {
        ModelVariant::Reduced
    } else {
        ModelVariant::Full
    };
    assert_eq!(state.variant(), expected);
    assert!(constrained.is_constrained());
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"analysis_temperature": 7.5}"#).unwrap();

    assert!(matches!(
        load_config(Some(path), SettingsArgs::default()),
        Err(AppError::Validation(_))
    ));
}
