// src/aggregator.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{PostureClassifier, Verdict};
use crate::error::{PostureError, PostureResult};
use crate::measurement::Measurement;

/// Averaged result of one closed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub started_at: Option<f64>,
    pub samples: usize,
    pub mean: Measurement,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowOutcome {
    Verdict(WindowSummary),
    /// The window closed without a single usable measurement.
    InsufficientData { started_at: Option<f64> },
}

impl WindowOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            WindowOutcome::Verdict(summary) => Some(&summary.verdict),
            WindowOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn started_at(&self) -> Option<f64> {
        match self {
            WindowOutcome::Verdict(summary) => summary.started_at,
            WindowOutcome::InsufficientData { started_at } => *started_at,
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    started_at: Option<f64>,
    samples: Vec<Measurement>,
}

/// Collects per-frame measurements and turns them into one averaged verdict
/// per interval, so a single noisy detection never reaches the user.
///
/// The window is open (collecting) between flushes. A flush closes it,
/// averages, classifies and immediately opens the next one.
#[derive(Debug)]
pub struct TemporalAggregator {
    classifier: PostureClassifier,
    interval: f64,
    window: Window,
}

impl TemporalAggregator {
    /// `interval` is the window length in seconds, in the same clock as the
    /// timestamps passed to [`add`](Self::add) and [`maybe_flush`](Self::maybe_flush).
    /// It must be a positive, finite number of seconds.
    pub fn new(classifier: PostureClassifier, interval: f64) -> PostureResult<Self> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(PostureError::InvalidConfig(format!(
                "window interval must be positive, got {}",
                interval
            )));
        }

        Ok(Self {
            classifier,
            interval,
            window: Window::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.window.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.samples.is_empty()
    }

    pub fn window_started_at(&self) -> Option<f64> {
        self.window.started_at
    }

    pub fn add(&mut self, measurement: Measurement, timestamp: f64) {
        if !measurement.is_usable() {
            debug!(timestamp, "ignoring measurement with no determined field");
            return;
        }
        self.window.started_at.get_or_insert(timestamp);
        self.window.samples.push(measurement);
    }

    /// Closes the window once `interval` seconds have passed since it opened.
    pub fn maybe_flush(&mut self, now: f64) -> Option<WindowOutcome> {
        let started_at = *self.window.started_at.get_or_insert(now);

        // A clock that runs backwards gives a negative elapsed time and never fires
        if now - started_at < self.interval {
            return None;
        }

        let outcome = self.close();
        self.window.started_at = Some(now);
        Some(outcome)
    }

    /// Closes the window regardless of elapsed time. The next window opens
    /// at the next timestamp seen.
    pub fn flush_now(&mut self) -> WindowOutcome {
        let outcome = self.close();
        self.window.started_at = None;
        outcome
    }

    /// Drops the current window without emitting anything.
    pub fn reset(&mut self) {
        self.window = Window::default();
    }

    fn close(&mut self) -> WindowOutcome {
        let window = std::mem::take(&mut self.window);

        if window.samples.is_empty() {
            debug!(started_at = ?window.started_at, "window closed with insufficient data");
            return WindowOutcome::InsufficientData {
                started_at: window.started_at,
            };
        }

        let mean = Measurement::mean(&window.samples);
        let verdict = self.classifier.classify(&mean);

        debug!(
            started_at = ?window.started_at,
            samples = window.samples.len(),
            label = %verdict.label,
            reasons = %verdict.reason_ids(),
            "window closed"
        );

        WindowOutcome::Verdict(WindowSummary {
            started_at: window.started_at,
            samples: window.samples.len(),
            mean,
            verdict,
        })
    }
}
