//! Validation issues and severity accounting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category recorded when a validator exceeds its effective timeout.
pub const CATEGORY_VALIDATOR_TIMEOUT: &str = "validator_timeout";

/// Category recorded when a validator returns an error or panics.
pub const CATEGORY_VALIDATOR_ERROR: &str = "validator_error";

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A single problem reported by a validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub validator_id: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        validator_id: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validator_id: validator_id.into(),
            category: category.into(),
            severity,
            message: message.into(),
            line: None,
            suggestion: None,
        }
    }

    pub const fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Synthetic issue for a validator that ran out of time.
    pub fn timeout(validator_id: &str, after_ms: u64) -> Self {
        Self::new(
            validator_id,
            CATEGORY_VALIDATOR_TIMEOUT,
            Severity::Warning,
            format!("Validator '{validator_id}' timed out after {after_ms}ms"),
        )
    }

    /// Synthetic issue for a validator that failed.
    pub fn failure(validator_id: &str, error: &str) -> Self {
        Self::new(
            validator_id,
            CATEGORY_VALIDATOR_ERROR,
            Severity::Error,
            format!("Validator '{validator_id}' failed: {error}"),
        )
    }
}

/// Issue counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a ValidationIssue>) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            counts.record(issue.severity);
        }
        counts
    }

    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn absorb(&mut self, other: &Self) {
        self.critical += other.critical;
        self.error += other.error;
        self.warning += other.warning;
        self.info += other.info;
    }

    pub const fn total(&self) -> usize {
        self.critical + self.error + self.warning + self.info
    }
}
