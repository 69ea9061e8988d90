//! `ponder-config` — provider configuration.
//!
//! Provides:
//! - Typed provider schema with sampling defaults and pricing
//! - `${ENV_VAR}` substitution
//! - Validation into `PonderError::Configuration`
//! - Provider discovery in a `providers/` directory

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::{apply_all_defaults, DEFAULT_PROVIDER, DEFAULT_PROVIDERS_DIR};
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, EnvResolution, MissingEnvVar};
pub use io::{parse_provider, ProviderManager};
pub use schema::{ProviderConfig, ProviderMetadata, OPENAI_COMPATIBLE};
pub use validation::{validate, validate_with_env, ConfigValidationError, ValidationReport};
