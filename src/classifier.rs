// src/classifier.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::measurement::Measurement;

/// Limits for the three posture rules.
///
/// The angle limits are in degrees. `shoulder_diff_max` is in whatever unit
/// the keypoints use: 20 suits pixel coordinates, but normalized [0, 1]
/// coordinates need a limit around 0.03. Callers must keep the frame
/// coordinates and this limit in the same unit system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub trunk_angle_min: f64,
    pub head_tilt_min: f64,
    pub shoulder_diff_max: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            trunk_angle_min: 75.0,
            head_tilt_min: 130.0,
            shoulder_diff_max: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    TrunkForwardLean,
    HeadForwardTilt,
    ShouldersUneven,
}

impl Rule {
    pub const ALL: [Rule; 3] = [Rule::TrunkForwardLean, Rule::HeadForwardTilt, Rule::ShouldersUneven];

    pub fn id(&self) -> &'static str {
        match self {
            Rule::TrunkForwardLean => "trunk_forward_lean",
            Rule::HeadForwardTilt => "head_forward_tilt",
            Rule::ShouldersUneven => "shoulders_uneven",
        }
    }

    pub fn violation_message(&self) -> &'static str {
        match self {
            Rule::TrunkForwardLean => "Trunk leaning forward",
            Rule::HeadForwardTilt => "Head tilted forward",
            Rule::ShouldersUneven => "Shoulders uneven",
        }
    }

    pub fn pass_message(&self) -> &'static str {
        match self {
            Rule::TrunkForwardLean => "Trunk upright",
            Rule::HeadForwardTilt => "Head aligned",
            Rule::ShouldersUneven => "Shoulders level",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    Violated,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureLabel {
    Good,
    Bad,
    Undetermined,
}

impl PostureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureLabel::Good => "good",
            PostureLabel::Bad => "bad",
            PostureLabel::Undetermined => "undetermined",
        }
    }
}

impl fmt::Display for PostureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }

    /// RGB color for overlays and terminal badges.
    pub fn color(&self) -> [u8; 3] {
        match self {
            Severity::Ok => [76, 175, 80],
            Severity::Warning => [255, 152, 0],
            Severity::Critical => [244, 67, 54],
            Severity::Unknown => [158, 158, 158],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: PostureLabel,
    pub reasons: BTreeSet<Rule>,
    pub undetermined: BTreeSet<Rule>,
    pub severity: Severity,
}

impl Verdict {
    pub fn is_good(&self) -> bool {
        self.label == PostureLabel::Good
    }

    pub fn is_bad(&self) -> bool {
        self.label == PostureLabel::Bad
    }

    pub fn outcome(&self, rule: Rule) -> RuleOutcome {
        if self.reasons.contains(&rule) {
            RuleOutcome::Violated
        } else if self.undetermined.contains(&rule) {
            RuleOutcome::Undetermined
        } else {
            RuleOutcome::Pass
        }
    }

    pub fn headline(&self) -> &'static str {
        match self.label {
            PostureLabel::Good => "Posture good",
            PostureLabel::Bad => "Posture bad",
            PostureLabel::Undetermined => "Posture undetermined",
        }
    }

    /// Comma separated rule ids, for CSV cells and log fields.
    pub fn reason_ids(&self) -> String {
        join_rules(&self.reasons)
    }

    pub fn undetermined_ids(&self) -> String {
        join_rules(&self.undetermined)
    }
}

fn join_rules(rules: &BTreeSet<Rule>) -> String {
    rules.iter().map(Rule::id).collect::<Vec<_>>().join(",")
}

/// Stateless rule evaluator. Every rule is checked, so all violations are
/// reported together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostureClassifier {
    thresholds: Thresholds,
}

impl PostureClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, measurement: &Measurement) -> Verdict {
        let t = &self.thresholds;
        let checks = [
            (Rule::TrunkForwardLean, measurement.trunk_angle.map(|v| v < t.trunk_angle_min)),
            (Rule::HeadForwardTilt, measurement.head_tilt_angle.map(|v| v < t.head_tilt_min)),
            (Rule::ShouldersUneven, measurement.shoulder_height_diff.map(|v| v > t.shoulder_diff_max)),
        ];

        let mut reasons = BTreeSet::new();
        let mut undetermined = BTreeSet::new();
        for (rule, violated) in checks {
            match violated {
                Some(true) => {
                    reasons.insert(rule);
                }
                Some(false) => {}
                None => {
                    undetermined.insert(rule);
                }
            }
        }

        let label = if !reasons.is_empty() {
            PostureLabel::Bad
        } else if !undetermined.is_empty() {
            PostureLabel::Undetermined
        } else {
            PostureLabel::Good
        };

        let severity = match (label, reasons.len()) {
            (PostureLabel::Good, _) => Severity::Ok,
            (PostureLabel::Undetermined, _) => Severity::Unknown,
            (PostureLabel::Bad, 1) => Severity::Warning,
            (PostureLabel::Bad, _) => Severity::Critical,
        };

        Verdict {
            label,
            reasons,
            undetermined,
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(m: Measurement) -> Verdict {
        PostureClassifier::default().classify(&m)
    }

    #[test]
    fn test_good_posture() {
        let verdict = classify(Measurement::new(80.0, 140.0, 5.0));

        assert_eq!(verdict.label, PostureLabel::Good);
        assert!(verdict.reasons.is_empty());
        assert_eq!(verdict.severity, Severity::Ok);
    }

    #[test]
    fn test_single_violation() {
        let verdict = classify(Measurement::new(60.0, 140.0, 5.0));

        assert_eq!(verdict.label, PostureLabel::Bad);
        assert_eq!(verdict.reasons, BTreeSet::from([Rule::TrunkForwardLean]));
        assert_eq!(verdict.severity, Severity::Warning);
        assert_eq!(verdict.reason_ids(), "trunk_forward_lean");
    }

    #[test]
    fn test_all_violations_reported() {
        let verdict = classify(Measurement::new(60.0, 100.0, 25.0));

        assert_eq!(verdict.label, PostureLabel::Bad);
        assert_eq!(
            verdict.reasons,
            BTreeSet::from([Rule::TrunkForwardLean, Rule::HeadForwardTilt, Rule::ShouldersUneven])
        );
        assert_eq!(verdict.severity, Severity::Critical);
    }

    #[test]
    fn test_limits_are_inclusive() {
        let verdict = classify(Measurement::new(75.0, 130.0, 20.0));
        assert!(verdict.is_good());
    }

    #[test]
    fn test_undetermined_field_is_not_a_pass() {
        let verdict = classify(Measurement {
            trunk_angle: None,
            head_tilt_angle: Some(140.0),
            shoulder_height_diff: Some(5.0),
        });

        assert_eq!(verdict.label, PostureLabel::Undetermined);
        assert_eq!(verdict.outcome(Rule::TrunkForwardLean), RuleOutcome::Undetermined);
        assert_eq!(verdict.outcome(Rule::HeadForwardTilt), RuleOutcome::Pass);
        assert_eq!(verdict.severity, Severity::Unknown);
    }

    #[test]
    fn test_violation_wins_over_undetermined() {
        let verdict = classify(Measurement {
            trunk_angle: None,
            head_tilt_angle: Some(100.0),
            shoulder_height_diff: None,
        });

        assert_eq!(verdict.label, PostureLabel::Bad);
        assert_eq!(verdict.outcome(Rule::HeadForwardTilt), RuleOutcome::Violated);
        assert_eq!(verdict.undetermined_ids(), "trunk_forward_lean,shoulders_uneven");
    }

    #[test]
    fn test_classify_is_pure() {
        let classifier = PostureClassifier::default();
        let m = Measurement::new(74.9, 131.0, 20.5);

        assert_eq!(classifier.classify(&m), classifier.classify(&m));
    }

    #[test]
    fn test_custom_thresholds_for_normalized_coordinates() {
        let classifier = PostureClassifier::new(Thresholds {
            shoulder_diff_max: 0.03,
            ..Thresholds::default()
        });

        let verdict = classifier.classify(&Measurement::new(90.0, 150.0, 0.05));
        assert_eq!(verdict.reasons, BTreeSet::from([Rule::ShouldersUneven]));
    }
}
