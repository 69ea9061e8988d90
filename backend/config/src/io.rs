//! Provider file discovery and loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use ponder_core::{PonderError, Result};

use crate::defaults::{
    apply_all_defaults, DEFAULT_PROVIDER, DEFAULT_PROVIDERS_DIR, PROVIDER_FILE_EXTENSION,
};
use crate::env::resolve_env_vars;
use crate::schema::ProviderConfig;
use crate::validation::validate_with_env;

/// Loads provider YAML files from a directory.
#[derive(Debug, Clone)]
pub struct ProviderManager {
    providers_dir: PathBuf,
    default_provider: String,
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDERS_DIR)
    }
}

impl ProviderManager {
    pub fn new(providers_dir: impl Into<PathBuf>) -> Self {
        Self {
            providers_dir: providers_dir.into(),
            default_provider: DEFAULT_PROVIDER.to_string(),
        }
    }

    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    pub fn providers_dir(&self) -> &Path {
        &self.providers_dir
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn config_path(&self, provider_name: &str) -> PathBuf {
        self.providers_dir
            .join(format!("{provider_name}.{PROVIDER_FILE_EXTENSION}"))
    }

    /// Load `<providers_dir>/<name>.yml`, falling back to the default provider.
    pub async fn load_provider(&self, provider_name: Option<&str>) -> Result<ProviderConfig> {
        let name = provider_name.unwrap_or(&self.default_provider);
        let path = self.config_path(name);
        if !path.exists() {
            return Err(PonderError::configuration(format!(
                "Provider configuration '{name}' not found at {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read provider file: {}", path.display()))?;
        let config = parse_provider(&raw, name)?;
        info!(provider = %name, model = %config.model, "Loaded provider");
        Ok(config)
    }

    /// Sorted provider names (file stems). Creates the directory if needed.
    pub async fn list_providers(&self) -> Result<Vec<String>> {
        fs::create_dir_all(&self.providers_dir)
            .await
            .with_context(|| {
                format!("Failed to create providers directory: {}", self.providers_dir.display())
            })?;

        let mut entries = fs::read_dir(&self.providers_dir)
            .await
            .with_context(|| format!("Failed to list {}", self.providers_dir.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Failed to read directory entry")? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROVIDER_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        debug!(count = names.len(), dir = %self.providers_dir.display(), "Listed providers");
        Ok(names)
    }
}

/// YAML text → env substitution → typed config → defaults → validation.
pub fn parse_provider(raw: &str, provider_name: &str) -> Result<ProviderConfig> {
    let value: Value = serde_yaml::from_str(raw).map_err(|e| {
        PonderError::configuration(format!("Invalid YAML in provider '{provider_name}': {e}"))
    })?;
    if !value.is_object() {
        return Err(PonderError::configuration(format!(
            "Provider '{provider_name}' must be a YAML mapping"
        )));
    }

    let resolution = resolve_env_vars(&value);
    let config: ProviderConfig = serde_json::from_value(resolution.value).map_err(|e| {
        PonderError::configuration(format!("Invalid provider '{provider_name}': {e}"))
    })?;
    let config = apply_all_defaults(config, provider_name);

    let report = validate_with_env(&config, &resolution.missing);
    for warning in &report.warnings {
        warn!(path = %warning.path, message = %warning.message, "Provider config warning");
    }
    report.into_result()?;
    Ok(config)
}
