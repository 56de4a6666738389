// src/tracking.rs - Per-frame posture session
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::aggregator::{TemporalAggregator, WindowOutcome};
use crate::classifier::{PostureClassifier, PostureLabel, Verdict};
use crate::config::PostureConfig;
use crate::error::PostureResult;
use crate::keypoints::{BodyRole, Frame};
use crate::measurement::{Measurement, PostureLandmarks};
use crate::source::KeypointSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum UndeterminedCause {
    /// The detector returned no person at all.
    NoPerson,
    /// A person was seen but some required landmarks were not.
    MissingKeypoints { roles: Vec<BodyRole> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameAssessment {
    Verdict(Verdict),
    Undetermined(UndeterminedCause),
}

impl FrameAssessment {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            FrameAssessment::Verdict(v) => Some(v),
            FrameAssessment::Undetermined(_) => None,
        }
    }

    pub fn label(&self) -> PostureLabel {
        match self {
            FrameAssessment::Verdict(v) => v.label,
            FrameAssessment::Undetermined(_) => PostureLabel::Undetermined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub timestamp: f64,
    pub measurement: Option<Measurement>,
    pub instantaneous: FrameAssessment,
    /// Present only on frames where a window closed.
    pub aggregated: Option<WindowOutcome>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames: u64,
    pub frames_without_person: u64,
    pub frames_missing_keypoints: u64,
    pub good_frames: u64,
    pub bad_frames: u64,
    pub undetermined_frames: u64,
    pub windows: u64,
    pub insufficient_windows: u64,
}

impl SessionStats {
    fn record_frame(&mut self, assessment: &FrameAssessment) {
        self.frames += 1;
        match assessment {
            FrameAssessment::Undetermined(UndeterminedCause::NoPerson) => {
                self.frames_without_person += 1;
            }
            FrameAssessment::Undetermined(UndeterminedCause::MissingKeypoints { .. }) => {
                self.frames_missing_keypoints += 1;
            }
            FrameAssessment::Verdict(v) => match v.label {
                PostureLabel::Good => self.good_frames += 1,
                PostureLabel::Bad => self.bad_frames += 1,
                PostureLabel::Undetermined => self.undetermined_frames += 1,
            },
        }
    }

    fn record_window(&mut self, outcome: &WindowOutcome) {
        self.windows += 1;
        if let WindowOutcome::InsufficientData { .. } = outcome {
            self.insufficient_windows += 1;
        }
    }

    /// Share of frames with a person in view where posture was bad.
    pub fn bad_ratio(&self) -> Option<f64> {
        let judged = self.good_frames + self.bad_frames;
        (judged > 0).then(|| self.bad_frames as f64 / judged as f64)
    }
}

/// Drives one posture session: frames in, instantaneous and windowed
/// feedback out. One tracker per camera; trackers share nothing.
#[derive(Debug)]
pub struct PostureTracker {
    config: PostureConfig,
    classifier: PostureClassifier,
    aggregator: TemporalAggregator,
    latest_assessment: Option<FrameAssessment>,
    latest_window: Option<WindowOutcome>,
    stats: SessionStats,
}

impl PostureTracker {
    pub fn new(config: PostureConfig) -> PostureResult<Self> {
        config.validate()?;

        let classifier = PostureClassifier::new(config.thresholds);
        let aggregator = TemporalAggregator::new(classifier, config.window_interval_seconds)?;

        info!(
            side = ?config.body_side,
            head = ?config.head_reference,
            interval = config.window_interval_seconds,
            "posture tracker ready"
        );

        Ok(Self {
            config,
            classifier,
            aggregator,
            latest_assessment: None,
            latest_window: None,
            stats: SessionStats::default(),
        })
    }

    pub fn config(&self) -> &PostureConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn latest_assessment(&self) -> Option<&FrameAssessment> {
        self.latest_assessment.as_ref()
    }

    /// Verdict of the last frame, if that frame could be judged.
    pub fn latest_verdict(&self) -> Option<&Verdict> {
        self.latest_assessment.as_ref().and_then(FrameAssessment::verdict)
    }

    pub fn latest_window(&self) -> Option<&WindowOutcome> {
        self.latest_window.as_ref()
    }

    /// Number of measurements in the open window.
    pub fn pending_samples(&self) -> usize {
        self.aggregator.len()
    }

    pub fn on_frame(&mut self, frame: &Frame, now: f64) -> FrameResult {
        let (measurement, instantaneous) = self.assess(frame, now);
        trace!(timestamp = now, label = %instantaneous.label(), "frame assessed");

        // Polled on every frame so windows also close while nobody is in view
        let aggregated = self.aggregator.maybe_flush(now);
        if let Some(outcome) = &aggregated {
            self.record_window(outcome);
        }

        self.stats.record_frame(&instantaneous);
        self.latest_assessment = Some(instantaneous.clone());

        FrameResult {
            timestamp: now,
            measurement,
            instantaneous,
            aggregated,
        }
    }

    fn assess(&mut self, frame: &Frame, now: f64) -> (Option<Measurement>, FrameAssessment) {
        if frame.is_empty() {
            return (None, FrameAssessment::Undetermined(UndeterminedCause::NoPerson));
        }

        let landmarks = match PostureLandmarks::extract(
            frame,
            self.config.body_side,
            self.config.head_reference,
            self.config.min_confidence,
        ) {
            Ok(landmarks) => landmarks,
            Err(roles) => {
                debug!(timestamp = now, missing = ?roles, "required keypoints missing");
                return (
                    None,
                    FrameAssessment::Undetermined(UndeterminedCause::MissingKeypoints { roles }),
                );
            }
        };

        let measurement = landmarks.measure();
        let verdict = self.classifier.classify(&measurement);
        self.aggregator.add(measurement, now);

        (Some(measurement), FrameAssessment::Verdict(verdict))
    }

    /// Manual feedback request: closes the current window immediately.
    pub fn flush(&mut self) -> WindowOutcome {
        let outcome = self.aggregator.flush_now();
        self.record_window(&outcome);
        outcome
    }

    fn record_window(&mut self, outcome: &WindowOutcome) {
        self.stats.record_window(outcome);
        self.latest_window = Some(outcome.clone());
    }

    /// Forgets the open window, the latest state and the statistics.
    pub fn reset(&mut self) {
        self.aggregator.reset();
        self.latest_assessment = None;
        self.latest_window = None;
        self.stats = SessionStats::default();
    }

    /// Pumps every frame from `source` through [`on_frame`](Self::on_frame),
    /// handing each result to `sink`. Returns the number of frames processed.
    pub fn drive<S, F>(&mut self, source: &mut S, mut sink: F) -> PostureResult<usize>
    where
        S: KeypointSource + ?Sized,
        F: FnMut(&FrameResult),
    {
        let mut processed = 0;
        while let Some(timed) = source.next_frame()? {
            let result = self.on_frame(&timed.frame, timed.timestamp);
            sink(&result);
            processed += 1;
        }
        info!(frames = processed, "keypoint source exhausted");
        Ok(processed)
    }
}
