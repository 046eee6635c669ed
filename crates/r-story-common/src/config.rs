//! ---
//! story_section: "01-core-functionality"
//! story_subsection: "module"
//! story_type: "source"
//! story_scope: "code"
//! story_description: "Shared primitives and utilities for the page runtime."
//! story_version: "v0.0.0-prealpha"
//! story_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_progress_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_max_playing() -> usize {
    4
}

fn default_max_registered() -> usize {
    16
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_has_audio() -> bool {
    true
}

fn default_animation_duration() -> Duration {
    Duration::from_millis(500)
}

/// Primary configuration object for the R-Story runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct StoryConfig {
    #[serde(default)]
    pub story: StoryDocumentConfig,
    #[serde(default)]
    pub page: PageRuntimeConfig,
    #[serde(default)]
    pub media_pool: MediaPoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where a [`StoryConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedStoryConfig {
    pub config: StoryConfig,
    pub source: PathBuf,
}

impl StoryConfig {
    pub const ENV_CONFIG_PATH: &str = "R_STORY_CONFIG";

    /// Load configuration from disk, respecting the `R_STORY_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedStoryConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedStoryConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedStoryConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read and validate a single configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<StoryConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Retrieve a page specification by identifier.
    pub fn page(&self, page_id: &str) -> Option<&PageSpec> {
        self.story.pages.get(page_id)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.story.pages.is_empty() {
            return Err(anyhow!("configuration must contain at least one page"));
        }
        let mut media_ids = HashSet::new();
        for (page_id, page) in &self.story.pages {
            if page_id.trim().is_empty() || page_id.chars().any(char::is_whitespace) {
                return Err(anyhow!("page id '{}' must be a non-empty token", page_id));
            }
            page.validate(page_id, &mut media_ids)?;
        }
        self.page.validate()?;
        self.media_pool.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for StoryConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: StoryConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Markup-level description of a story: its canonical URL and ordered pages.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryDocumentConfig {
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub pages: IndexMap<String, PageSpec>,
}

/// Attributes and children of a single page element.
///
/// Navigation overrides are kept as raw attribute text; interpreting them
/// (and ignoring malformed values) is the page controller's job.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PageSpec {
    #[serde(default)]
    pub advance_to: Option<String>,
    #[serde(default)]
    pub auto_advance_to: Option<String>,
    #[serde(default)]
    pub auto_advance_after: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaSpec>,
    #[serde(default)]
    pub animations: Vec<AnimationSpec>,
}

impl PageSpec {
    fn validate(&self, page_id: &str, media_ids: &mut HashSet<String>) -> Result<()> {
        for media in &self.media {
            if media.id.trim().is_empty() {
                return Err(anyhow!("page '{}' declares media without an id", page_id));
            }
            if !media_ids.insert(media.id.clone()) {
                return Err(anyhow!(
                    "media id '{}' on page '{}' is not unique",
                    media.id,
                    page_id
                ));
            }
        }
        for animation in &self.animations {
            if animation.target.trim().is_empty() {
                return Err(anyhow!(
                    "page '{}' declares an animation without a target",
                    page_id
                ));
            }
        }
        Ok(())
    }
}

/// Kind of playable element.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    #[default]
    Video,
}

impl MediaKind {
    pub fn tag_name(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaSpec {
    pub id: String,
    #[serde(default)]
    pub kind: MediaKind,
    #[serde(default = "default_has_audio")]
    pub has_audio: bool,
    /// Simulated time until the element reports load end.
    #[serde(default)]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub load_delay: Option<Duration>,
    /// Never report load end.
    #[serde(default)]
    pub stalled: bool,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnimationSpec {
    pub target: String,
    pub preset: String,
    #[serde(default)]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub delay: Duration,
    #[serde(default = "default_animation_duration")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
}

/// Runtime knobs shared by every page controller.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PageRuntimeConfig {
    #[serde(default)]
    pub development_mode: bool,
    /// Treat a media element as loaded once this elapses. `None` waits forever.
    #[serde(default)]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub media_load_timeout: Option<Duration>,
    #[serde(default = "default_progress_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub progress_interval: Duration,
    /// Timed advancement for pages without a usable `auto-advance-after`.
    #[serde(default)]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub default_advance_after: Option<Duration>,
}

impl Default for PageRuntimeConfig {
    fn default() -> Self {
        Self {
            development_mode: false,
            media_load_timeout: None,
            progress_interval: default_progress_interval(),
            default_advance_after: None,
        }
    }
}

impl PageRuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval.is_zero() {
            return Err(anyhow!("page.progress-interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Admission limits enforced by the shared media pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaPoolConfig {
    #[serde(default = "default_max_playing")]
    pub max_playing: usize,
    #[serde(default = "default_max_registered")]
    pub max_registered: usize,
}

impl Default for MediaPoolConfig {
    fn default() -> Self {
        Self {
            max_playing: default_max_playing(),
            max_registered: default_max_registered(),
        }
    }
}

impl MediaPoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_playing == 0 {
            return Err(anyhow!("media-pool.max-playing must be at least 1"));
        }
        if self.max_registered < self.max_playing {
            return Err(anyhow!(
                "media-pool.max-registered ({}) must not be lower than max-playing ({})",
                self.max_registered,
                self.max_playing
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
