//! Recommendations and critique results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity attached to a generated recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RecommendationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A generated suggestion for improving a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub instruction: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub severity: RecommendationSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_content: Option<String>,
    pub confidence: f64,
    /// Category of the validation issue this was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_category: Option<String>,
    /// Message of the validation issue this was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_message: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Number of refinements applied.
    #[serde(default)]
    pub revision: u32,
    /// Score assigned by the most recent critique.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

impl Recommendation {
    pub fn new(
        instruction: impl Into<String>,
        scope: impl Into<String>,
        severity: RecommendationSeverity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instruction: instruction.into(),
            scope: scope.into(),
            rationale: None,
            severity,
            original_content: None,
            proposed_content: None,
            confidence: 0.5,
            issue_category: None,
            issue_message: None,
            created_at: Utc::now(),
            revision: 0,
            quality_score: None,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_content_change(
        mut self,
        original: impl Into<String>,
        proposed: impl Into<String>,
    ) -> Self {
        self.original_content = Some(original.into());
        self.proposed_content = Some(proposed.into());
        self
    }

    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_issue(mut self, category: impl Into<String>, message: impl Into<String>) -> Self {
        self.issue_category = Some(category.into());
        self.issue_message = Some(message.into());
        self
    }

    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn has_rationale(&self) -> bool {
        self.rationale
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }
}

/// One of the four quality axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Actionable,
    FixesIssue,
    Specific,
    SideEffects,
}

impl QualityDimension {
    pub const ALL: [Self; 4] = [
        Self::Actionable,
        Self::FixesIssue,
        Self::Specific,
        Self::SideEffects,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Actionable => "actionable",
            Self::FixesIssue => "fixes_issue",
            Self::Specific => "specific",
            Self::SideEffects => "side_effects",
        }
    }
}

impl fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict on a single dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionAssessment {
    pub passed: bool,
    pub reason: String,
    /// Contribution before weighting, in [0, 1].
    pub score: f64,
}

impl DimensionAssessment {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
            score: 1.0,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
            score: 0.0,
        }
    }
}

/// Where a critique's verdicts came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritiqueSource {
    Rules,
    RulesAndLlm,
}

/// Outcome the critic derives from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritiqueDecision {
    Accept,
    Refine,
    Discard,
}

/// Result of critiquing one recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueResult {
    pub actionable: DimensionAssessment,
    pub fixes_issue: DimensionAssessment,
    pub specific: DimensionAssessment,
    pub side_effects: DimensionAssessment,
    pub quality_score: f64,
    pub should_discard: bool,
    pub needs_refinement: bool,
    pub source: CritiqueSource,
}

impl CritiqueResult {
    pub const fn dimension(&self, dimension: QualityDimension) -> &DimensionAssessment {
        match dimension {
            QualityDimension::Actionable => &self.actionable,
            QualityDimension::FixesIssue => &self.fixes_issue,
            QualityDimension::Specific => &self.specific,
            QualityDimension::SideEffects => &self.side_effects,
        }
    }

    pub const fn decision(&self) -> CritiqueDecision {
        if self.should_discard {
            CritiqueDecision::Discard
        } else if self.needs_refinement {
            CritiqueDecision::Refine
        } else {
            CritiqueDecision::Accept
        }
    }

    /// Dimensions that did not pass.
    pub fn failed_dimensions(&self) -> Vec<QualityDimension> {
        QualityDimension::ALL
            .into_iter()
            .filter(|d| !self.dimension(*d).passed)
            .collect()
    }
}

/// Per-dimension verdict from an external critique service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmDimensionVerdict {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub reason: String,
}

/// Assessment returned by an external critique service. Dimensions the
/// service does not address are left to the rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actionable: Option<LlmDimensionVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixes_issue: Option<LlmDimensionVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific: Option<LlmDimensionVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<LlmDimensionVerdict>,
}

impl LlmAssessment {
    pub const fn dimension(&self, dimension: QualityDimension) -> Option<&LlmDimensionVerdict> {
        match dimension {
            QualityDimension::Actionable => self.actionable.as_ref(),
            QualityDimension::FixesIssue => self.fixes_issue.as_ref(),
            QualityDimension::Specific => self.specific.as_ref(),
            QualityDimension::SideEffects => self.side_effects.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_generator_record_with_defaults() {
        let json = r#"{
            "instruction": "Replace the deprecated `Document.Save(path)` call with `Document.Save(path, SaveFormat.Docx)`",
            "scope": "code block under ## Saving",
            "severity": "high",
            "confidence": 0.8
        }"#;

        let rec: Recommendation = serde_json::from_str(json).unwrap();
        assert_eq!(rec.severity, RecommendationSeverity::High);
        assert_eq!(rec.revision, 0);
        assert!(rec.rationale.is_none());
        assert!(rec.quality_score.is_none());
    }

    #[test]
    fn blank_rationale_does_not_count() {
        let rec = Recommendation::new("x", "y", RecommendationSeverity::Low).with_rationale("  ");
        assert!(!rec.has_rationale());
    }

    #[test]
    fn decision_follows_flags() {
        let mut critique = CritiqueResult {
            actionable: DimensionAssessment::pass("ok"),
            fixes_issue: DimensionAssessment::fail("no rationale"),
            specific: DimensionAssessment::pass("ok"),
            side_effects: DimensionAssessment::pass("ok"),
            quality_score: 0.7,
            should_discard: false,
            needs_refinement: false,
            source: CritiqueSource::Rules,
        };
        assert_eq!(critique.decision(), CritiqueDecision::Accept);
        assert_eq!(critique.failed_dimensions(), vec![QualityDimension::FixesIssue]);

        critique.needs_refinement = true;
        assert_eq!(critique.decision(), CritiqueDecision::Refine);
    }
}
