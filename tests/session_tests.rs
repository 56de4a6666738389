//! Integration tests for a full posture session.
//!
//! Frames go in through the public API only: the classifier, the windowed
//! aggregator and the tracker driven by a JSON-lines keypoint source.

use approx::assert_relative_eq;
use assert_matches::assert_matches;
use std::collections::BTreeSet;
use std::io::Cursor;

use posture_monitor::{
    BodyRole, BodySide, Frame, FrameAssessment, HeadReference, JsonLinesSource, Keypoint,
    Measurement, PostureClassifier, PostureConfig, PostureError, PostureLabel, PostureTracker,
    Rule, TemporalAggregator, UndeterminedCause, WindowOutcome,
};

fn upright() -> Frame {
    Frame::new()
        .with(BodyRole::Nose, Keypoint::new(100.0, 0.0, 0.95))
        .with(BodyRole::LeftShoulder, Keypoint::new(100.0, 100.0, 0.95))
        .with(BodyRole::RightShoulder, Keypoint::new(160.0, 105.0, 0.95))
        .with(BodyRole::LeftHip, Keypoint::new(100.0, 300.0, 0.95))
        .with(BodyRole::RightHip, Keypoint::new(160.0, 300.0, 0.95))
        .with(BodyRole::LeftKnee, Keypoint::new(200.0, 300.0, 0.95))
        .with(BodyRole::RightKnee, Keypoint::new(260.0, 300.0, 0.95))
}

/// Upright trunk, but the nose has dropped in front of the shoulder.
fn head_forward() -> Frame {
    upright().with(BodyRole::Nose, Keypoint::new(200.0, 100.0, 0.95))
}

fn jsonl(frames: &[(f64, Frame)]) -> String {
    frames
        .iter()
        .map(|(timestamp, frame)| {
            serde_json::json!({ "timestamp": timestamp, "keypoints": frame }).to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn good_measurement_has_no_reasons() {
    let verdict = PostureClassifier::default().classify(&Measurement::new(80.0, 140.0, 5.0));

    assert_eq!(verdict.label, PostureLabel::Good);
    assert!(verdict.reasons.is_empty());
}

#[test]
fn forward_lean_is_the_only_reason() {
    let verdict = PostureClassifier::default().classify(&Measurement::new(60.0, 140.0, 5.0));

    assert_eq!(verdict.label, PostureLabel::Bad);
    assert_eq!(verdict.reasons, BTreeSet::from([Rule::TrunkForwardLean]));
}

#[test]
fn every_violation_is_reported() {
    let verdict = PostureClassifier::default().classify(&Measurement::new(60.0, 100.0, 25.0));

    assert_eq!(verdict.label, PostureLabel::Bad);
    assert_eq!(
        verdict.reason_ids(),
        "trunk_forward_lean,head_forward_tilt,shoulders_uneven"
    );
}

// ---------------------------------------------------------------------------
// Windowed aggregation
// ---------------------------------------------------------------------------

/// Three trunk readings of 70, 80 and 90 average to 80, which passes.
#[test]
fn window_averages_before_classifying() {
    let mut aggregator = TemporalAggregator::new(PostureClassifier::default(), 10.0).unwrap();
    for (i, trunk) in [70.0, 80.0, 90.0].into_iter().enumerate() {
        aggregator.add(Measurement::new(trunk, 150.0, 4.0), i as f64);
    }

    let outcome = aggregator.flush_now();
    let WindowOutcome::Verdict(summary) = outcome else {
        panic!("expected a verdict, got {:?}", outcome);
    };
    assert_eq!(summary.samples, 3);
    assert_relative_eq!(summary.mean.trunk_angle.unwrap(), 80.0);
    assert!(summary.verdict.is_good());
    assert!(aggregator.is_empty());
}

#[test]
fn empty_window_is_insufficient_data() {
    let mut aggregator = TemporalAggregator::new(PostureClassifier::default(), 10.0).unwrap();

    assert_matches!(aggregator.flush_now(), WindowOutcome::InsufficientData { .. });
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// A frame without the left hip cannot be judged and never reaches the window.
#[test]
fn missing_hip_leaves_window_untouched() {
    let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();
    tracker.on_frame(&upright(), 0.0);

    let result = tracker.on_frame(&upright().without(BodyRole::LeftHip), 1.0);

    assert_matches!(
        &result.instantaneous,
        FrameAssessment::Undetermined(UndeterminedCause::MissingKeypoints { roles })
            if roles == &vec![BodyRole::LeftHip]
    );
    assert_eq!(result.measurement, None);
    assert_eq!(tracker.pending_samples(), 1);
}

/// Low confidence counts as missing.
#[test]
fn low_confidence_keypoint_is_missing() {
    let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();
    let frame = upright().with(BodyRole::LeftKnee, Keypoint::new(200.0, 300.0, 0.2));

    let result = tracker.on_frame(&frame, 0.0);

    assert_eq!(result.instantaneous.label(), PostureLabel::Undetermined);
    assert_eq!(tracker.pending_samples(), 0);
}

/// Measuring the left side does not excuse a missing right hip.
#[test]
fn left_side_still_requires_right_hip() {
    let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();

    let result = tracker.on_frame(&upright().without(BodyRole::RightHip), 0.0);

    assert_matches!(
        &result.instantaneous,
        FrameAssessment::Undetermined(UndeterminedCause::MissingKeypoints { roles })
            if roles == &vec![BodyRole::RightHip]
    );
    assert_eq!(tracker.pending_samples(), 0);
}

#[test]
fn right_side_still_requires_left_landmarks() {
    let config = PostureConfig {
        body_side: BodySide::Right,
        ..PostureConfig::default()
    };
    let mut tracker = PostureTracker::new(config).unwrap();
    let frame = upright()
        .without(BodyRole::LeftHip)
        .without(BodyRole::LeftKnee);

    let result = tracker.on_frame(&frame, 0.0);

    assert_matches!(
        &result.instantaneous,
        FrameAssessment::Undetermined(UndeterminedCause::MissingKeypoints { roles })
            if roles == &vec![BodyRole::LeftHip, BodyRole::LeftKnee]
    );
    assert_eq!(tracker.pending_samples(), 0);
}

/// With the ear as head point the nose is still required.
#[test]
fn ear_reference_still_requires_nose() {
    let config = PostureConfig {
        head_reference: HeadReference::Ear,
        ..PostureConfig::default()
    };
    let mut tracker = PostureTracker::new(config).unwrap();
    let frame = upright()
        .with(BodyRole::LeftEar, Keypoint::new(110.0, 20.0, 0.95))
        .without(BodyRole::Nose);

    let result = tracker.on_frame(&frame, 0.0);

    assert_eq!(result.instantaneous.label(), PostureLabel::Undetermined);
    assert_eq!(tracker.pending_samples(), 0);
}

#[test]
fn drive_replays_recording_and_closes_windows() {
    let mut frames: Vec<(f64, Frame)> = (0..=10).map(|t| (t as f64, upright())).collect();
    frames.extend((11..=20).map(|t| (t as f64, head_forward())));
    frames.push((21.0, Frame::new()));

    let mut source = JsonLinesSource::new(Cursor::new(jsonl(&frames)));
    let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();
    let mut windows = Vec::new();

    let processed = tracker
        .drive(&mut source, |result| {
            if let Some(outcome) = &result.aggregated {
                windows.push(outcome.clone());
            }
        })
        .unwrap();

    assert_eq!(processed, 22);
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].verdict().map(|v| v.label), Some(PostureLabel::Good));

    let second = windows[1].verdict().expect("window with samples");
    assert_eq!(second.reasons, BTreeSet::from([Rule::HeadForwardTilt]));

    let stats = tracker.stats();
    assert_eq!(stats.frames, 22);
    assert_eq!(stats.good_frames, 11);
    assert_eq!(stats.bad_frames, 10);
    assert_eq!(stats.frames_without_person, 1);
    assert_eq!(tracker.latest_assessment().map(|a| a.label()), Some(PostureLabel::Undetermined));
    assert!(tracker.latest_verdict().is_none());
}

#[test]
fn drive_stops_on_malformed_line() {
    let input = format!("{}\n{{broken\n", jsonl(&[(0.0, upright())]));
    let mut source = JsonLinesSource::new(Cursor::new(input));
    let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();

    let err = tracker.drive(&mut source, |_| {}).unwrap_err();

    assert_matches!(err, PostureError::MalformedFrame { line: 2, .. });
    assert_eq!(tracker.stats().frames, 1);
}

/// The same frames and timestamps always give the same results.
#[test]
fn sessions_are_deterministic() {
    let frames: Vec<(f64, Frame)> = (0..30)
        .map(|t| {
            let frame = if t % 3 == 0 { head_forward() } else { upright() };
            (t as f64 * 0.5, frame)
        })
        .collect();

    let run = || {
        let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();
        frames
            .iter()
            .map(|(t, frame)| tracker.on_frame(frame, *t))
            .collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn frame_result_serializes_with_tags() {
    let mut tracker = PostureTracker::new(PostureConfig::default()).unwrap();
    let result = tracker.on_frame(&Frame::new(), 0.0);

    let value = serde_json::to_value(&result).expect("serialization should succeed");

    assert_eq!(value["instantaneous"]["status"], "undetermined");
    assert_eq!(value["instantaneous"]["cause"], "no_person");
    assert!(value["measurement"].is_null());
}
