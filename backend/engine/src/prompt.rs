use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

/// System prompt describing the step/command protocol.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../res/system.prompt.md");

/// Read a custom system prompt, or fall back to the built-in one.
pub async fn load_system_prompt(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(DEFAULT_SYSTEM_PROMPT.to_string());
    };
    let prompt = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read system prompt: {}", path.display()))?;
    info!(path = %path.display(), "Loaded custom system prompt");
    Ok(prompt)
}
