//! Config defaults: values applied when a provider file leaves a field out.

use crate::schema::ProviderConfig;

/// Directory holding `<name>.yml` provider files.
pub const DEFAULT_PROVIDERS_DIR: &str = "providers";

/// Provider loaded when none is named.
pub const DEFAULT_PROVIDER: &str = "gpt-4o";

/// Extension of provider files.
pub const PROVIDER_FILE_EXTENSION: &str = "yml";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TOP_P: f32 = 1.0;

pub(crate) fn temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

pub(crate) fn max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

pub(crate) fn top_p() -> f32 {
    DEFAULT_TOP_P
}

pub(crate) fn enforce_json_response() -> bool {
    true
}

/// Fill in values that depend on where the config came from.
pub fn apply_all_defaults(config: ProviderConfig, provider_name: &str) -> ProviderConfig {
    let config = apply_name_default(config, provider_name);
    apply_base_url_default(config)
}

/// An empty display name falls back to the file stem.
fn apply_name_default(mut config: ProviderConfig, provider_name: &str) -> ProviderConfig {
    if config.name.trim().is_empty() {
        config.name = provider_name.to_string();
    }
    config
}

/// A blank `base_url` (e.g. from an unset env var) means "use the default endpoint".
fn apply_base_url_default(mut config: ProviderConfig) -> ProviderConfig {
    if config.base_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
        config.base_url = None;
    }
    config
}
