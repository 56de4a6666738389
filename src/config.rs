// src/config.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::Thresholds;
use crate::error::{PostureError, PostureResult};
use crate::keypoints::{BodySide, HeadReference};

/// Tunable settings for one posture session. Every key is optional in the
/// JSON form; missing keys take the defaults below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    #[serde(flatten)]
    pub thresholds: Thresholds,
    /// Length of the averaging window in seconds.
    pub window_interval_seconds: f64,
    pub body_side: BodySide,
    pub head_reference: HeadReference,
    /// Keypoints below this confidence count as absent.
    pub min_confidence: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            window_interval_seconds: 10.0,
            body_side: BodySide::Left,
            head_reference: HeadReference::Nose,
            min_confidence: 0.5,
        }
    }
}

impl PostureConfig {
    /// Default config file location in the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "PostureMonitor")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn load(path: impl AsRef<Path>) -> PostureResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> PostureResult<Self> {
        let config: PostureConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> PostureResult<()> {
        self.validate()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> PostureResult<()> {
        let t = &self.thresholds;

        for (name, value) in [
            ("trunk_angle_min", t.trunk_angle_min),
            ("head_tilt_min", t.head_tilt_min),
        ] {
            if !(0.0..=180.0).contains(&value) {
                return Err(PostureError::InvalidConfig(format!(
                    "{} must be between 0 and 180 degrees, got {}",
                    name, value
                )));
            }
        }

        if !t.shoulder_diff_max.is_finite() || t.shoulder_diff_max < 0.0 {
            return Err(PostureError::InvalidConfig(format!(
                "shoulder_diff_max must be a non-negative number, got {}",
                t.shoulder_diff_max
            )));
        }

        if !self.window_interval_seconds.is_finite() || self.window_interval_seconds <= 0.0 {
            return Err(PostureError::InvalidConfig(format!(
                "window_interval_seconds must be positive, got {}",
                self.window_interval_seconds
            )));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PostureError::InvalidConfig(format!(
                "min_confidence must be between 0 and 1, got {}",
                self.min_confidence
            )));
        }

        Ok(())
    }
}
