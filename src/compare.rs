// src/compare.rs - Before/after posture comparison
use serde::{Deserialize, Serialize};

use crate::measurement::Measurement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TrunkAngle,
    /// Larger is better: the angle opens toward 180° as the head comes up
    /// over the shoulders, matching the classifier's lower limit.
    HeadTiltAngle,
    ShoulderHeightDiff,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::TrunkAngle, Metric::HeadTiltAngle, Metric::ShoulderHeightDiff];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::TrunkAngle => "Trunk",
            Metric::HeadTiltAngle => "Head tilt",
            Metric::ShoulderHeightDiff => "Shoulder difference",
        }
    }

    fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::ShoulderHeightDiff)
    }

    fn read(&self, m: &Measurement) -> Option<f64> {
        match self {
            Metric::TrunkAngle => m.trunk_angle,
            Metric::HeadTiltAngle => m.head_tilt_angle,
            Metric::ShoulderHeightDiff => m.shoulder_height_diff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Improved,
    NotImproved,
    Undetermined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonItem {
    pub metric: Metric,
    pub before: Option<f64>,
    pub after: Option<f64>,
    pub change: Change,
}

impl ComparisonItem {
    pub fn message(&self) -> &'static str {
        match (self.metric, self.change) {
            (Metric::TrunkAngle, Change::Improved) => "The trunk is more upright.",
            (Metric::TrunkAngle, Change::NotImproved) => "The trunk has not improved.",
            (Metric::HeadTiltAngle, Change::Improved) => "The head is better aligned.",
            (Metric::HeadTiltAngle, Change::NotImproved) => "The head is still tilted forward.",
            (Metric::ShoulderHeightDiff, Change::Improved) => "The shoulders are more level.",
            (Metric::ShoulderHeightDiff, Change::NotImproved) => "The shoulders are still uneven.",
            (_, Change::Undetermined) => "Could not be measured in both images.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub items: Vec<ComparisonItem>,
}

impl Comparison {
    pub fn item(&self, metric: Metric) -> Option<&ComparisonItem> {
        self.items.iter().find(|item| item.metric == metric)
    }

    pub fn improved_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.change == Change::Improved)
            .count()
    }
}

/// Compares two measurements of the same person. An unchanged value counts
/// as not improved.
pub fn compare(before: &Measurement, after: &Measurement) -> Comparison {
    let items = Metric::ALL
        .iter()
        .map(|metric| {
            let b = metric.read(before);
            let a = metric.read(after);
            let change = match (b, a) {
                (Some(b), Some(a)) => {
                    let better = if metric.higher_is_better() { a > b } else { a < b };
                    if better {
                        Change::Improved
                    } else {
                        Change::NotImproved
                    }
                }
                _ => Change::Undetermined,
            };
            ComparisonItem {
                metric: *metric,
                before: b,
                after: a,
                change,
            }
        })
        .collect();

    Comparison { items }
}
