//! Article view configuration.
//!
//! Loaded from TOML (every key optional) and snapshotted into
//! [`RenderParameters`] once per orchestrator. A theme change means a new
//! orchestrator, never a mutated snapshot.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Configuration for the article view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArticleConfig {
    /// Theme name sent to the content environment.
    pub theme: String,
    /// Content margins in pixels.
    pub margin_top: u32,
    pub margin_right: u32,
    pub margin_bottom: u32,
    pub margin_left: u32,
    /// Height reserved for the lead image, in pixels.
    pub lead_image_height: u32,
    /// Pixel width requested when fetching lead image thumbnails.
    pub lead_image_width: u32,
    /// Duration of the surface fade-in.
    pub reveal_duration_ms: u32,
    /// Custom scheme routed through the content fetcher.
    pub scheme: String,
    /// Content cache limit in MB.
    pub max_cache_mb: usize,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            margin_top: 16,
            margin_right: 16,
            margin_bottom: 16,
            margin_left: 16,
            lead_image_height: 210,
            lead_image_width: 640,
            reveal_duration_ms: 200,
            scheme: "app".to_string(),
            max_cache_mb: 8,
        }
    }
}

impl ArticleConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ArticleConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("Loaded article config from {}", path.display());
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.scheme.is_empty() || !self.scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FolioError::Config(format!(
                "scheme must be non-empty ASCII alphanumeric, got {:?}",
                self.scheme
            )));
        }
        if self.theme.is_empty() {
            return Err(FolioError::Config("theme must not be empty".to_string()));
        }
        if self.lead_image_width == 0 {
            return Err(FolioError::Config(
                "lead_image_width must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache size in bytes.
    pub fn cache_size_bytes(&self) -> usize {
        self.max_cache_mb * 1024 * 1024
    }

    /// Snapshot the parameters sent to the content environment at setup.
    pub fn render_parameters(&self) -> RenderParameters {
        RenderParameters {
            theme: self.theme.clone(),
            margins: Margins {
                top: px(self.margin_top),
                right: px(self.margin_right),
                bottom: px(self.margin_bottom),
                left: px(self.margin_left),
            },
            lead_image_height: px(self.lead_image_height),
        }
    }
}

fn px(value: u32) -> String {
    format!("{value}px")
}

/// Margins as CSS pixel strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

/// Immutable configuration snapshot sent to the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParameters {
    pub theme: String,
    pub margins: Margins,
    pub lead_image_height: String,
}
