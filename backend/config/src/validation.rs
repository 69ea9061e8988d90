//! Provider config validation: collects every problem in one pass.

use thiserror::Error;

use ponder_core::PonderError;

use crate::env::MissingEnvVar;
use crate::schema::{ProviderConfig, OPENAI_COMPATIBLE};

/// A config validation problem with field path and message.
#[derive(Debug, Clone, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Collapse the errors into one `Configuration` error.
    pub fn into_result(self) -> Result<(), PonderError> {
        if self.is_valid() {
            return Ok(());
        }
        let message = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(PonderError::configuration(message))
    }
}

pub fn validate(config: &ProviderConfig) -> ValidationReport {
    validate_with_env(config, &[])
}

/// Validate, attaching unresolved `${VAR}` references as warnings.
pub fn validate_with_env(config: &ProviderConfig, missing: &[MissingEnvVar]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for var in missing {
        report.warn(&var.config_path, format!("env var {} is not set", var.var_name));
    }
    validate_provider(config, &mut report);
    validate_sampling(config, &mut report);
    validate_pricing(config, &mut report);
    report
}

fn validate_provider(config: &ProviderConfig, report: &mut ValidationReport) {
    if config.provider_type != OPENAI_COMPATIBLE {
        report.error(
            "provider_type",
            format!("Unsupported provider type: {}", config.provider_type),
        );
    }
    if config.api_key.trim().is_empty() {
        report.error(
            "api_key",
            "API key not provided in provider config and not found in environment variables",
        );
    }
    if config.model.trim().is_empty() {
        report.error("model", "Model name cannot be empty");
    }
    if let Some(url) = &config.base_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            report.error("base_url", format!("Expected an http(s) URL, got '{url}'"));
        }
    }
    if config.timeout_secs == Some(0) {
        report.error("timeout_secs", "Timeout must be at least one second");
    }
}

fn validate_sampling(config: &ProviderConfig, report: &mut ValidationReport) {
    if config.max_tokens == 0 {
        report.error("max_tokens", "max_tokens must be greater than 0");
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        report.warn(
            "temperature",
            format!("{} is outside the usual 0.0..=2.0 range", config.temperature),
        );
    }
    if !(config.top_p > 0.0 && config.top_p <= 1.0) {
        report.warn("top_p", format!("{} is outside the usual (0.0, 1.0] range", config.top_p));
    }
    for (path, penalty) in [
        ("frequency_penalty", config.frequency_penalty),
        ("presence_penalty", config.presence_penalty),
    ] {
        if !(-2.0..=2.0).contains(&penalty) {
            report.warn(path, format!("{penalty} is outside the usual -2.0..=2.0 range"));
        }
    }
}

fn validate_pricing(config: &ProviderConfig, report: &mut ValidationReport) {
    if let Err(e) = config.pricing.validate() {
        report.error("pricing", e.to_string());
    }
    if config.pricing.cached_tokens > config.pricing.input_tokens {
        report.warn("pricing.cached_tokens", "Cached tokens are priced above fresh input tokens");
    }
}
