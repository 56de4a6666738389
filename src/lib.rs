//! Posture evaluation from 2D body keypoints.
//!
//! Keypoints come from an external pose detector, one [`Frame`] per
//! detector call. A [`PostureTracker`] turns each frame into an
//! instantaneous [`Verdict`] and, every few seconds, an averaged one that
//! smooths over detector noise.

pub mod aggregator;
pub mod classifier;
pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod keypoints;
pub mod measurement;
pub mod source;
pub mod tracking;

pub use aggregator::{TemporalAggregator, WindowOutcome, WindowSummary};
pub use classifier::{PostureClassifier, PostureLabel, Rule, RuleOutcome, Severity, Thresholds, Verdict};
pub use compare::{compare, Change, Comparison, Metric};
pub use config::PostureConfig;
pub use error::{PostureError, PostureResult};
pub use geometry::angle_at_vertex;
pub use keypoints::{BodyRole, BodySide, Frame, HeadReference, Keypoint};
pub use measurement::{Measurement, PostureLandmarks};
pub use source::{JsonLinesSource, KeypointSource, TimedFrame};
pub use tracking::{FrameAssessment, FrameResult, PostureTracker, SessionStats, UndeterminedCause};
