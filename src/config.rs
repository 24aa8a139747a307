//! Configuration builders controlling text and binary row conversion.

use std::fs;
use std::path::Path;

use crate::error::{FeatureError, Result};
use crate::feature::FeatureMode;
use serde::{Deserialize, Serialize};

/// Marker Hive writes for NULL list elements.
pub const DEFAULT_NULL_TOKEN: &str = "\\N";

/// Configuration for converting text rows into binary row files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConvertConfig {
    /// Feature variant produced for every token.
    pub mode: FeatureMode,
    /// Token text treated as an absent element; `None` treats every token as present.
    pub null_token: Option<String>,
    /// Drops rows that fail to parse instead of aborting the conversion.
    pub skip_invalid_rows: bool,
    /// Drops rows without any present token.
    pub skip_empty_rows: bool,
    /// Rows between progress log lines; `0` disables progress logging.
    pub progress_interval: usize,
}

impl ConvertConfig {
    /// Returns a builder initialised with [`ConvertConfig::default`].
    #[must_use]
    pub fn builder() -> ConvertBuilder {
        ConvertBuilder::default()
    }

    /// Loads and validates a JSON configuration file.  Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw =
            fs::read_to_string(path).map_err(|err| FeatureError::io(err, Some(path.into())))?;
        let cfg: ConvertConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the invariants required for conversion.
    pub fn validate(&self) -> Result<()> {
        if let Some(marker) = &self.null_token {
            if marker.is_empty() {
                return Err(FeatureError::InvalidConfig(
                    "null_token must not be empty".into(),
                ));
            }
            if marker.chars().any(char::is_whitespace) {
                return Err(FeatureError::InvalidConfig(format!(
                    "null_token {marker:?} must not contain whitespace"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            mode: FeatureMode::Named,
            null_token: Some(DEFAULT_NULL_TOKEN.into()),
            skip_invalid_rows: false,
            skip_empty_rows: false,
            progress_interval: 100_000,
        }
    }
}

/// Builder for [`ConvertConfig`].
#[derive(Debug, Default, Clone)]
pub struct ConvertBuilder {
    cfg: ConvertConfig,
}

impl ConvertBuilder {
    /// Creates a builder with [`ConvertConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from disk.
    #[must_use]
    pub fn from_config(cfg: ConvertConfig) -> Self {
        Self { cfg }
    }

    /// Sets the feature mode.
    #[must_use]
    pub fn mode(mut self, mode: FeatureMode) -> Self {
        self.cfg.mode = mode;
        self
    }

    /// Overrides the absent-element marker.
    #[must_use]
    pub fn null_token<S: Into<String>>(mut self, marker: Option<S>) -> Self {
        self.cfg.null_token = marker.map(Into::into);
        self
    }

    /// Enables or disables skipping of rows that fail to parse.
    #[must_use]
    pub fn skip_invalid_rows(mut self, enabled: bool) -> Self {
        self.cfg.skip_invalid_rows = enabled;
        self
    }

    /// Enables or disables skipping of rows without features.
    #[must_use]
    pub fn skip_empty_rows(mut self, enabled: bool) -> Self {
        self.cfg.skip_empty_rows = enabled;
        self
    }

    /// Sets the number of rows between progress log lines.
    #[must_use]
    pub fn progress_interval(mut self, rows: usize) -> Self {
        self.cfg.progress_interval = rows;
        self
    }

    /// Finalises the builder, returning a validated [`ConvertConfig`].
    pub fn build(self) -> Result<ConvertConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}
