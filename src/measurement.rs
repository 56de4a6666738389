// src/measurement.rs
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::{angle_at_vertex, vertical_offset};
use crate::keypoints::{BodyRole, BodySide, Frame, HeadReference};

/// Scalar triple the classifier works on. `None` means the value could not
/// be determined for this frame (or window) and must not be guessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Angle at the hip between shoulder and knee, degrees.
    pub trunk_angle: Option<f64>,
    /// Angle at the shoulder between head and hip, degrees.
    pub head_tilt_angle: Option<f64>,
    /// Vertical distance between the shoulders, input units.
    pub shoulder_height_diff: Option<f64>,
}

impl Measurement {
    pub fn new(trunk_angle: f64, head_tilt_angle: f64, shoulder_height_diff: f64) -> Self {
        Self {
            trunk_angle: Some(trunk_angle),
            head_tilt_angle: Some(head_tilt_angle),
            shoulder_height_diff: Some(shoulder_height_diff),
        }
    }

    pub fn undetermined() -> Self {
        Self::default()
    }

    /// True if at least one field carries a value.
    pub fn is_usable(&self) -> bool {
        self.trunk_angle.is_some()
            || self.head_tilt_angle.is_some()
            || self.shoulder_height_diff.is_some()
    }

    /// Field-wise arithmetic mean, skipping undetermined values. A field that
    /// is undetermined in every sample stays undetermined.
    pub fn mean<'a>(samples: impl IntoIterator<Item = &'a Measurement>) -> Measurement {
        let mut sums = [0.0_f64; 3];
        let mut counts = [0_usize; 3];

        for sample in samples {
            let fields = [
                sample.trunk_angle,
                sample.head_tilt_angle,
                sample.shoulder_height_diff,
            ];
            for (i, value) in fields.iter().enumerate() {
                if let Some(v) = value {
                    sums[i] += v;
                    counts[i] += 1;
                }
            }
        }

        let average = |i: usize| (counts[i] > 0).then(|| sums[i] / counts[i] as f64);

        Measurement {
            trunk_angle: average(0),
            head_tilt_angle: average(1),
            shoulder_height_diff: average(2),
        }
    }
}

/// Landmarks every judged frame must carry, whichever side is measured.
pub const CORE_ROLES: [BodyRole; 7] = [
    BodyRole::Nose,
    BodyRole::LeftShoulder,
    BodyRole::RightShoulder,
    BodyRole::LeftHip,
    BodyRole::RightHip,
    BodyRole::LeftKnee,
    BodyRole::RightKnee,
];

/// Roles that must be present for a frame to produce a Measurement: the
/// core set, plus the measured side's ear when the ear stands in for the head.
/// `side` only picks which of them feed the angles.
pub fn required_roles(side: BodySide, head: HeadReference) -> Vec<BodyRole> {
    let mut roles = CORE_ROLES.to_vec();
    let head_role = head.role(side);
    if !roles.contains(&head_role) {
        roles.push(head_role);
    }
    roles
}

/// The five points a Measurement is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureLandmarks {
    pub head: Point2<f64>,
    pub shoulder: Point2<f64>,
    pub other_shoulder: Point2<f64>,
    pub hip: Point2<f64>,
    pub knee: Point2<f64>,
}

impl PostureLandmarks {
    /// Pulls the required points out of `frame`, or returns every required
    /// role that is missing or below `min_confidence`.
    pub fn extract(
        frame: &Frame,
        side: BodySide,
        head: HeadReference,
        min_confidence: f64,
    ) -> Result<Self, Vec<BodyRole>> {
        let missing: Vec<BodyRole> = required_roles(side, head)
            .into_iter()
            .filter(|role| frame.visible(*role, min_confidence).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let point = |role: BodyRole| frame.visible(role, min_confidence).ok_or_else(|| vec![role]);

        Ok(Self {
            head: point(head.role(side))?,
            shoulder: point(side.shoulder())?,
            other_shoulder: point(side.opposite().shoulder())?,
            hip: point(side.hip())?,
            knee: point(side.knee())?,
        })
    }

    /// Derives the Measurement. A degenerate angle leaves only that field
    /// undetermined.
    pub fn measure(&self) -> Measurement {
        let trunk_angle = match angle_at_vertex(&self.shoulder, &self.hip, &self.knee) {
            Ok(angle) => Some(angle),
            Err(e) => {
                warn!(field = "trunk_angle", "{}", e);
                None
            }
        };

        let head_tilt_angle = match angle_at_vertex(&self.head, &self.shoulder, &self.hip) {
            Ok(angle) => Some(angle),
            Err(e) => {
                warn!(field = "head_tilt_angle", "{}", e);
                None
            }
        };

        Measurement {
            trunk_angle,
            head_tilt_angle,
            shoulder_height_diff: Some(vertical_offset(&self.shoulder, &self.other_shoulder)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::Keypoint;
    use approx::assert_abs_diff_eq;

    fn upright_frame() -> Frame {
        Frame::new()
            .with(BodyRole::Nose, Keypoint::new(100.0, 0.0, 0.9))
            .with(BodyRole::LeftShoulder, Keypoint::new(100.0, 100.0, 0.9))
            .with(BodyRole::RightShoulder, Keypoint::new(160.0, 110.0, 0.9))
            .with(BodyRole::LeftHip, Keypoint::new(100.0, 300.0, 0.9))
            .with(BodyRole::RightHip, Keypoint::new(160.0, 300.0, 0.9))
            .with(BodyRole::LeftKnee, Keypoint::new(200.0, 300.0, 0.9))
            .with(BodyRole::RightKnee, Keypoint::new(260.0, 300.0, 0.9))
    }

    #[test]
    fn test_mean_skips_undetermined() {
        let samples = [
            Measurement::new(70.0, 140.0, 4.0),
            Measurement {
                trunk_angle: Some(80.0),
                head_tilt_angle: None,
                shoulder_height_diff: Some(6.0),
            },
            Measurement {
                trunk_angle: Some(90.0),
                head_tilt_angle: None,
                shoulder_height_diff: None,
            },
        ];
        let mean = Measurement::mean(&samples);

        assert_abs_diff_eq!(mean.trunk_angle.unwrap(), 80.0);
        assert_abs_diff_eq!(mean.head_tilt_angle.unwrap(), 140.0);
        assert_abs_diff_eq!(mean.shoulder_height_diff.unwrap(), 5.0);
    }

    #[test]
    fn test_mean_of_nothing_is_undetermined() {
        let mean = Measurement::mean(&[]);
        assert_eq!(mean, Measurement::undetermined());
        assert!(!mean.is_usable());
    }

    #[test]
    fn test_measure_upright_sitting_pose() {
        let landmarks =
            PostureLandmarks::extract(&upright_frame(), BodySide::Left, HeadReference::Nose, 0.5)
                .unwrap();
        let m = landmarks.measure();

        // Thigh horizontal, torso vertical: seated at a right angle
        assert_abs_diff_eq!(m.trunk_angle.unwrap(), 90.0, epsilon = 1e-9);
        // Nose straight above shoulder, hip straight below
        assert_abs_diff_eq!(m.head_tilt_angle.unwrap(), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.shoulder_height_diff.unwrap(), 10.0);
    }

    #[test]
    fn test_extract_reports_missing_roles() {
        let frame = upright_frame()
            .without(BodyRole::LeftHip)
            .with(BodyRole::Nose, Keypoint::new(100.0, 0.0, 0.1));
        let missing =
            PostureLandmarks::extract(&frame, BodySide::Left, HeadReference::Nose, 0.5).unwrap_err();

        assert_eq!(missing, vec![BodyRole::Nose, BodyRole::LeftHip]);
    }

    #[test]
    fn test_both_sides_are_required() {
        // Measuring the left side still needs the right hip and knee
        let frame = upright_frame()
            .without(BodyRole::RightHip)
            .without(BodyRole::RightKnee);
        let missing =
            PostureLandmarks::extract(&frame, BodySide::Left, HeadReference::Nose, 0.5).unwrap_err();

        assert_eq!(missing, vec![BodyRole::RightHip, BodyRole::RightKnee]);
    }

    #[test]
    fn test_ear_reference_adds_ear_and_keeps_nose() {
        let frame = upright_frame().without(BodyRole::Nose);
        let missing =
            PostureLandmarks::extract(&frame, BodySide::Right, HeadReference::Ear, 0.5).unwrap_err();

        assert_eq!(missing, vec![BodyRole::Nose, BodyRole::RightEar]);
        assert_eq!(
            required_roles(BodySide::Left, HeadReference::Nose),
            CORE_ROLES.to_vec()
        );
    }

    #[test]
    fn test_side_picks_derivation_points() {
        let landmarks =
            PostureLandmarks::extract(&upright_frame(), BodySide::Right, HeadReference::Nose, 0.5)
                .unwrap();

        assert_eq!(landmarks.shoulder, Point2::new(160.0, 110.0));
        assert_eq!(landmarks.other_shoulder, Point2::new(100.0, 100.0));
        assert_eq!(landmarks.hip, Point2::new(160.0, 300.0));
        assert_eq!(landmarks.knee, Point2::new(260.0, 300.0));
    }

    #[test]
    fn test_degenerate_angle_only_clears_that_field() {
        // Knee reported on top of the hip
        let frame = upright_frame().with(BodyRole::LeftKnee, Keypoint::new(100.0, 300.0, 0.9));
        let m = PostureLandmarks::extract(&frame, BodySide::Left, HeadReference::Nose, 0.5)
            .unwrap()
            .measure();

        assert_eq!(m.trunk_angle, None);
        assert!(m.head_tilt_angle.is_some());
        assert!(m.shoulder_height_diff.is_some());
        assert!(m.is_usable());
    }
}
