// src/keypoints.rs
use nalgebra::Point2;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PostureError;

/// Body landmarks the posture core understands, in COCO-17 order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRole {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl BodyRole {
    pub const ALL: [BodyRole; 17] = [
        BodyRole::Nose,
        BodyRole::LeftEye,
        BodyRole::RightEye,
        BodyRole::LeftEar,
        BodyRole::RightEar,
        BodyRole::LeftShoulder,
        BodyRole::RightShoulder,
        BodyRole::LeftElbow,
        BodyRole::RightElbow,
        BodyRole::LeftWrist,
        BodyRole::RightWrist,
        BodyRole::LeftHip,
        BodyRole::RightHip,
        BodyRole::LeftKnee,
        BodyRole::RightKnee,
        BodyRole::LeftAnkle,
        BodyRole::RightAnkle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BodyRole::Nose => "nose",
            BodyRole::LeftEye => "left_eye",
            BodyRole::RightEye => "right_eye",
            BodyRole::LeftEar => "left_ear",
            BodyRole::RightEar => "right_ear",
            BodyRole::LeftShoulder => "left_shoulder",
            BodyRole::RightShoulder => "right_shoulder",
            BodyRole::LeftElbow => "left_elbow",
            BodyRole::RightElbow => "right_elbow",
            BodyRole::LeftWrist => "left_wrist",
            BodyRole::RightWrist => "right_wrist",
            BodyRole::LeftHip => "left_hip",
            BodyRole::RightHip => "right_hip",
            BodyRole::LeftKnee => "left_knee",
            BodyRole::RightKnee => "right_knee",
            BodyRole::LeftAnkle => "left_ankle",
            BodyRole::RightAnkle => "right_ankle",
        }
    }

    pub fn from_name(name: &str) -> Option<BodyRole> {
        BodyRole::ALL.iter().copied().find(|role| role.name() == name)
    }

    /// Row index in a COCO-17 keypoint array (YOLO pose models).
    pub fn coco_index(&self) -> usize {
        *self as usize
    }

    /// Row index in a MediaPipe Pose landmark array (33 landmarks).
    pub fn mediapipe_index(&self) -> usize {
        match self {
            BodyRole::Nose => 0,
            BodyRole::LeftEye => 2,
            BodyRole::RightEye => 5,
            BodyRole::LeftEar => 7,
            BodyRole::RightEar => 8,
            BodyRole::LeftShoulder => 11,
            BodyRole::RightShoulder => 12,
            BodyRole::LeftElbow => 13,
            BodyRole::RightElbow => 14,
            BodyRole::LeftWrist => 15,
            BodyRole::RightWrist => 16,
            BodyRole::LeftHip => 23,
            BodyRole::RightHip => 24,
            BodyRole::LeftKnee => 25,
            BodyRole::RightKnee => 26,
            BodyRole::LeftAnkle => 27,
            BodyRole::RightAnkle => 28,
        }
    }
}

impl fmt::Display for BodyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the body feeds the angle computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySide {
    #[default]
    Left,
    Right,
}

impl BodySide {
    pub fn shoulder(&self) -> BodyRole {
        match self {
            BodySide::Left => BodyRole::LeftShoulder,
            BodySide::Right => BodyRole::RightShoulder,
        }
    }

    pub fn hip(&self) -> BodyRole {
        match self {
            BodySide::Left => BodyRole::LeftHip,
            BodySide::Right => BodyRole::RightHip,
        }
    }

    pub fn knee(&self) -> BodyRole {
        match self {
            BodySide::Left => BodyRole::LeftKnee,
            BodySide::Right => BodyRole::RightKnee,
        }
    }

    pub fn ear(&self) -> BodyRole {
        match self {
            BodySide::Left => BodyRole::LeftEar,
            BodySide::Right => BodyRole::RightEar,
        }
    }

    pub fn opposite(&self) -> BodySide {
        match self {
            BodySide::Left => BodySide::Right,
            BodySide::Right => BodySide::Left,
        }
    }
}

impl FromStr for BodySide {
    type Err = PostureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(BodySide::Left),
            "right" | "r" => Ok(BodySide::Right),
            other => Err(PostureError::InvalidConfig(format!(
                "unknown body side '{}', expected left or right",
                other
            ))),
        }
    }
}

/// Landmark standing in for the head in the head-tilt angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadReference {
    #[default]
    Nose,
    Ear,
}

impl HeadReference {
    pub fn role(&self, side: BodySide) -> BodyRole {
        match self {
            HeadReference::Nose => BodyRole::Nose,
            HeadReference::Ear => side.ear(),
        }
    }
}

fn default_confidence() -> f64 {
    1.0
}

/// A detected landmark. Coordinates are in whatever unit the detector
/// produced (pixels or normalized); confidence is in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn is_visible(&self, threshold: f64) -> bool {
        self.confidence >= threshold && self.x.is_finite() && self.y.is_finite()
    }
}

/// One detector invocation: at most one person, keyed by body role.
///
/// In JSON, landmarks outside the COCO-17 roles (MediaPipe's hands and
/// feet, for instance) are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Frame {
    keypoints: BTreeMap<BodyRole, Keypoint>,
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrameVisitor;

        impl<'de> Visitor<'de> for FrameVisitor {
            type Value = Frame;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of body role names to keypoints")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Frame, A::Error> {
                let mut keypoints = BTreeMap::new();
                while let Some(name) = map.next_key::<String>()? {
                    match BodyRole::from_name(&name) {
                        Some(role) => {
                            keypoints.insert(role, map.next_value::<Keypoint>()?);
                        }
                        None => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(Frame { keypoints })
            }
        }

        deserializer.deserialize_map(FrameVisitor)
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: BodyRole, keypoint: Keypoint) -> Self {
        self.keypoints.insert(role, keypoint);
        self
    }

    pub fn without(mut self, role: BodyRole) -> Self {
        self.keypoints.remove(&role);
        self
    }

    /// Builds a frame from COCO-17 rows of `[x, y, confidence]`. Rows past
    /// the end of the slice are treated as not detected.
    pub fn from_coco17(rows: &[[f64; 3]]) -> Self {
        Self::from_rows(rows, BodyRole::coco_index)
    }

    /// Builds a frame from MediaPipe Pose rows of `[x, y, visibility]`.
    pub fn from_mediapipe33(rows: &[[f64; 3]]) -> Self {
        Self::from_rows(rows, BodyRole::mediapipe_index)
    }

    fn from_rows(rows: &[[f64; 3]], index: fn(&BodyRole) -> usize) -> Self {
        let keypoints = BodyRole::ALL
            .iter()
            .filter_map(|role| {
                rows.get(index(role))
                    .map(|row| (*role, Keypoint::new(row[0], row[1], row[2])))
            })
            .collect();
        Self { keypoints }
    }

    /// Converts normalized [0, 1] coordinates to pixel coordinates.
    pub fn scaled(&self, width: f64, height: f64) -> Self {
        let keypoints = self
            .keypoints
            .iter()
            .map(|(role, kp)| (*role, Keypoint::new(kp.x * width, kp.y * height, kp.confidence)))
            .collect();
        Self { keypoints }
    }

    pub fn get(&self, role: BodyRole) -> Option<&Keypoint> {
        self.keypoints.get(&role)
    }

    /// Position of `role` if it was detected with at least `min_confidence`.
    pub fn visible(&self, role: BodyRole, min_confidence: f64) -> Option<Point2<f64>> {
        self.get(role)
            .filter(|kp| kp.is_visible(min_confidence))
            .map(Keypoint::position)
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }
}
