// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::backends::camera::types::{Framerate, StreamGeometry};
use crate::constants::{self, status, timing};
use crate::errors::{ConfigurationError, PipelineError, PipelineResult};
use crate::pipelines::LockTimeouts;

/// Application directory name under the user's config and pictures dirs
pub const APP_DIR: &str = "filter-preview";

/// Config file name
pub const CONFIG_FILE: &str = "config.json";

/// Where frames come from
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Generated test pattern, no hardware needed
    #[default]
    Synthetic,
    /// Video4Linux device (requires the `v4l2` feature)
    V4l2 { device: String },
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preview width
    pub width: u32,
    /// Preview height
    pub height: u32,
    /// Nominal preview frame rate
    pub framerate: u32,
    /// Selected effect, restored on the next start
    pub effect_index: usize,
    /// Frame source
    pub source: SourceConfig,
    /// Bounded wait for an effect switch, in milliseconds
    pub switch_timeout_ms: u64,
    /// Bounded wait for a render pass, in milliseconds
    pub render_timeout_ms: u64,
    /// Consecutive failed pulls before the status line warns
    pub status_failure_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: constants::DEFAULT_WIDTH,
            height: constants::DEFAULT_HEIGHT,
            framerate: constants::DEFAULT_FRAMERATE,
            effect_index: 0,
            source: SourceConfig::default(),
            switch_timeout_ms: timing::SWITCH_LOCK_TIMEOUT.as_millis() as u64,
            render_timeout_ms: timing::RENDER_LOCK_TIMEOUT.as_millis() as u64,
            status_failure_threshold: status::FAILURE_THRESHOLD,
        }
    }
}

impl Config {
    /// Default config file location (`~/.config/filter-preview/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load_from(path: &Path) -> PipelineResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&text).map_err(ConfigurationError::from)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location
    pub fn load() -> PipelineResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Write to the default location
    pub fn save(&self) -> PipelineResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| PipelineError::Storage("No config directory".to_string()))?;
        self.save_to(&path)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let geometry = self.geometry();
        if !geometry.is_valid() {
            return Err(ConfigurationError::InvalidGeometry(geometry));
        }
        if self.framerate == 0 {
            return Err(ConfigurationError::Parse("framerate must be positive".to_string()));
        }
        Ok(())
    }

    pub fn geometry(&self) -> StreamGeometry {
        StreamGeometry::bgra(self.width, self.height)
    }

    pub fn framerate(&self) -> Framerate {
        Framerate::from_int(self.framerate)
    }

    pub fn lock_timeouts(&self) -> LockTimeouts {
        LockTimeouts {
            switch: Duration::from_millis(self.switch_timeout_ms),
            render: Duration::from_millis(self.render_timeout_ms),
        }
    }
}
