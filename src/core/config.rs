//! Configuration management for Tryon.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::entitlement::FREE_LIMIT;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Free quota settings
    pub entitlement: EntitlementConfig,

    /// Generation service settings
    pub generation: GenerationConfig,

    /// User-facing messages
    pub messages: MessagesConfig,
}

/// Free quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementConfig {
    /// Free generations before the premium offer is shown
    pub free_limit: u32,
}

/// Generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider name (gemini)
    pub provider: String,

    /// Model to use
    pub model: String,

    /// API base URL
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Instruction sent alongside the two images
    pub prompt: String,
}

/// User-facing messages.
///
/// Failures are never diagnosed to the user; these generic texts are all
/// they see.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Shown when submitting without both images
    pub incomplete_input: String,

    /// Shown after any generation failure
    pub generation_failed: String,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.tryon.toml` in current directory
    /// 2. `~/.config/tryon/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".tryon.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to a specific file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tryon"))
    }
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self { free_limit: FREE_LIMIT }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash-image-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            prompt: "The first image shows a person and the second image shows a garment. \
                     Produce a single photorealistic image of the same person wearing the \
                     garment, keeping their face, body shape, pose and background unchanged."
                .to_string(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            incomplete_input: "Please provide both images.".to_string(),
            generation_failed: "Something went wrong while generating the image. Please try again."
                .to_string(),
        }
    }
}
