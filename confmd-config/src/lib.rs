//! Shared configuration loader for confmd conversions.
//!
//! `defaults/confmd.default.toml` is embedded so that documented defaults and
//! runtime behavior stay in sync. Callers layer user-specific files on top of
//! those defaults via [`Loader`] before deserializing into [`ConfmdConfig`],
//! then hand the sections to the serializers as options.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use confmd_babel::{MarkdownOptions, PanelSyntax, StorageOptions};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/confmd.default.toml");

/// Top-level configuration consumed by confmd applications.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfmdConfig {
    pub markdown: MarkdownConfig,
    pub storage: StorageConfig,
}

/// Markdown serialization knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownConfig {
    pub panel_syntax: PanelSyntax,
    pub embed_roundtrip: bool,
}

impl From<MarkdownConfig> for MarkdownOptions {
    fn from(config: MarkdownConfig) -> Self {
        MarkdownOptions {
            panel_syntax: config.panel_syntax,
            embed_roundtrip: config.embed_roundtrip,
        }
    }
}

impl From<&MarkdownConfig> for MarkdownOptions {
    fn from(config: &MarkdownConfig) -> Self {
        MarkdownOptions {
            panel_syntax: config.panel_syntax,
            embed_roundtrip: config.embed_roundtrip,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub adf_panels: bool,
}

impl From<StorageConfig> for StorageOptions {
    fn from(config: StorageConfig) -> Self {
        StorageOptions {
            adf_panels: config.adf_panels,
        }
    }
}

impl From<&StorageConfig> for StorageOptions {
    fn from(config: &StorageConfig) -> Self {
        StorageOptions {
            adf_panels: config.adf_panels,
        }
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override, e.g. `markdown.panel_syntax`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<ConfmdConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<ConfmdConfig, ConfigError> {
    Loader::new().build()
}
