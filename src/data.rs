// src/data.rs - Session export (CSV + JSON summary)
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::aggregator::WindowOutcome;
use crate::config::PostureConfig;
use crate::tracking::{FrameAssessment, FrameResult, SessionStats, UndeterminedCause};

#[derive(Debug, Serialize)]
struct FrameRecord {
    frame: usize,
    timestamp: f64,
    person_detected: bool,
    status: &'static str,
    missing_keypoints: String,
    trunk_angle: Option<f64>,
    head_tilt_angle: Option<f64>,
    shoulder_height_diff: Option<f64>,
    reasons: String,
    undetermined_rules: String,
    severity: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WindowRecord {
    window: usize,
    started_at: Option<f64>,
    samples: usize,
    status: &'static str,
    trunk_angle: Option<f64>,
    head_tilt_angle: Option<f64>,
    shoulder_height_diff: Option<f64>,
    reasons: String,
}

#[derive(Debug, Serialize)]
struct SessionSummary<'a> {
    session_id: String,
    session_name: &'a str,
    exported_at: String,
    frames_recorded: usize,
    windows_recorded: usize,
    bad_ratio: Option<f64>,
    config: &'a PostureConfig,
    stats: &'a SessionStats,
}

/// Collects frame results of one session and writes them to
/// `<output_dir>/<session_name>/`.
pub struct DataExporter {
    output_dir: PathBuf,
    session_name: String,
    session_id: Uuid,
    frames: Vec<FrameResult>,
    windows: Vec<WindowOutcome>,
}

impl DataExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            session_id: Uuid::new_v4(),
            frames: Vec::new(),
            windows: Vec::new(),
        }
    }

    /// `~/Documents/PostureMonitor`, or `./output` when there is no
    /// documents directory.
    pub fn default_output_dir() -> PathBuf {
        directories::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|p| p.join("PostureMonitor")))
            .unwrap_or_else(|| PathBuf::from("./output"))
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Records a frame, and its window verdict if one closed on it.
    pub fn add_frame(&mut self, result: &FrameResult) {
        if let Some(outcome) = &result.aggregated {
            self.windows.push(outcome.clone());
        }
        self.frames.push(result.clone());
    }

    /// Records a window closed outside the frame loop (manual flush).
    pub fn add_window(&mut self, outcome: &WindowOutcome) {
        self.windows.push(outcome.clone());
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn create_session_dir(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    pub fn export_frames_csv(&self) -> Result<PathBuf> {
        let csv_path = self.create_session_dir()?.join("frames.csv");
        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for (i, result) in self.frames.iter().enumerate() {
            writer.serialize(Self::frame_record(i, result))?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn export_windows_csv(&self) -> Result<PathBuf> {
        let csv_path = self.create_session_dir()?.join("windows.csv");
        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for (i, outcome) in self.windows.iter().enumerate() {
            writer.serialize(Self::window_record(i, outcome))?;
        }

        writer.flush()?;
        Ok(csv_path)
    }

    pub fn export_summary(&self, config: &PostureConfig, stats: &SessionStats) -> Result<PathBuf> {
        let summary_path = self.create_session_dir()?.join("summary.json");

        let summary = SessionSummary {
            session_id: self.session_id.to_string(),
            session_name: &self.session_name,
            exported_at: Local::now().to_rfc3339(),
            frames_recorded: self.frames.len(),
            windows_recorded: self.windows.len(),
            bad_ratio: stats.bad_ratio(),
            config,
            stats,
        };

        let contents = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&summary_path, contents)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;
        Ok(summary_path)
    }

    /// Writes all three files and returns the session directory.
    pub fn export_all(&self, config: &PostureConfig, stats: &SessionStats) -> Result<PathBuf> {
        self.export_frames_csv()?;
        self.export_windows_csv()?;
        self.export_summary(config, stats)?;
        Ok(self.session_dir())
    }

    fn frame_record(frame: usize, result: &FrameResult) -> FrameRecord {
        let measurement = result.measurement.unwrap_or_default();

        let mut record = FrameRecord {
            frame,
            timestamp: result.timestamp,
            person_detected: true,
            status: result.instantaneous.label().as_str(),
            missing_keypoints: String::new(),
            trunk_angle: measurement.trunk_angle,
            head_tilt_angle: measurement.head_tilt_angle,
            shoulder_height_diff: measurement.shoulder_height_diff,
            reasons: String::new(),
            undetermined_rules: String::new(),
            severity: None,
        };

        match &result.instantaneous {
            FrameAssessment::Verdict(verdict) => {
                record.reasons = verdict.reason_ids();
                record.undetermined_rules = verdict.undetermined_ids();
                record.severity = Some(verdict.severity.as_str());
            }
            FrameAssessment::Undetermined(UndeterminedCause::NoPerson) => {
                record.person_detected = false;
            }
            FrameAssessment::Undetermined(UndeterminedCause::MissingKeypoints { roles }) => {
                record.missing_keypoints = roles
                    .iter()
                    .map(|role| role.name())
                    .collect::<Vec<_>>()
                    .join(",");
            }
        }

        record
    }

    fn window_record(window: usize, outcome: &WindowOutcome) -> WindowRecord {
        let started_at = outcome.started_at();
        match outcome {
            WindowOutcome::Verdict(summary) => WindowRecord {
                window,
                started_at,
                samples: summary.samples,
                status: summary.verdict.label.as_str(),
                trunk_angle: summary.mean.trunk_angle,
                head_tilt_angle: summary.mean.head_tilt_angle,
                shoulder_height_diff: summary.mean.shoulder_height_diff,
                reasons: summary.verdict.reason_ids(),
            },
            WindowOutcome::InsufficientData { .. } => WindowRecord {
                window,
                started_at,
                samples: 0,
                status: "insufficient_data",
                trunk_angle: None,
                head_tilt_angle: None,
                shoulder_height_diff: None,
                reasons: String::new(),
            },
        }
    }
}
