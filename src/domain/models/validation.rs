//! Validation run results: per-validator outcomes, tier results and the
//! flow-level result assembled by the router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::issue::{SeverityCounts, ValidationIssue};

/// What a validator returns when it completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorOutput {
    pub issues: Vec<ValidationIssue>,
    /// Validator confidence in its findings, 0.0-1.0.
    pub confidence: f64,
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl ValidatorOutput {
    pub fn new(issues: Vec<ValidationIssue>, confidence: f64) -> Self {
        Self {
            issues,
            confidence: confidence.clamp(0.0, 1.0),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// Outcome of a single validator task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidatorOutcome {
    Completed(ValidatorOutput),
    TimedOut { after_ms: u64 },
    Failed { error: String },
}

impl ValidatorOutcome {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Record of one validator execution inside a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRun {
    pub validator_id: String,
    pub outcome: ValidatorOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ValidatorRun {
    /// Issues produced by this run, with timeouts and failures folded in as
    /// synthetic issues.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        match &self.outcome {
            ValidatorOutcome::Completed(output) => output.issues.clone(),
            ValidatorOutcome::TimedOut { after_ms } => {
                vec![ValidationIssue::timeout(&self.validator_id, *after_ms)]
            }
            ValidatorOutcome::Failed { error } => {
                vec![ValidationIssue::failure(&self.validator_id, error)]
            }
        }
    }
}

/// Result of executing one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResult {
    pub tier_name: String,
    pub ordinal: u32,
    pub parallel: bool,
    /// Validators run, in launch order.
    pub validators_run: Vec<String>,
    /// Issue list per validator, synthetic issues included.
    pub issues: BTreeMap<String, Vec<ValidationIssue>>,
    pub counts: SeverityCounts,
    pub duration_ms: u64,
    /// The tier exceeded its overall timeout.
    pub timed_out: bool,
    /// The flow stopped after this tier.
    pub terminated_early: bool,
}

impl TierResult {
    pub fn issue_count(&self) -> usize {
        self.issues.values().map(Vec::len).sum()
    }
}

/// Whether a declared validator ran in a given flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    Ran,
    Skipped,
}

/// Result of a complete validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub tiers: Vec<TierResult>,
    pub validator_results: BTreeMap<String, ValidatorRun>,
    pub routing: BTreeMap<String, RoutingDecision>,
    pub counts: SeverityCounts,
    pub terminated_early: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub total_duration_ms: u64,
}

impl FlowResult {
    pub fn new(profile: Option<String>, family: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            profile,
            family,
            tiers: Vec::new(),
            validator_results: BTreeMap::new(),
            routing: BTreeMap::new(),
            counts: SeverityCounts::default(),
            terminated_early: false,
            termination_reason: None,
            started_at: Utc::now(),
            total_duration_ms: 0,
        }
    }

    /// Merge a finished tier and its raw validator runs.
    pub fn absorb_tier(&mut self, tier: TierResult, runs: Vec<ValidatorRun>) {
        self.counts.absorb(&tier.counts);
        for run in runs {
            self.routing
                .insert(run.validator_id.clone(), RoutingDecision::Ran);
            self.validator_results.insert(run.validator_id.clone(), run);
        }
        self.tiers.push(tier);
    }

    pub fn mark_skipped<'a>(&mut self, validator_ids: impl IntoIterator<Item = &'a String>) {
        for id in validator_ids {
            self.routing
                .entry(id.clone())
                .or_insert(RoutingDecision::Skipped);
        }
    }

    /// Record an early stop. The most recent tier carries the flag too.
    pub fn terminate(&mut self, reason: impl Into<String>) {
        self.terminated_early = true;
        self.termination_reason = Some(reason.into());
        if let Some(last) = self.tiers.last_mut() {
            last.terminated_early = true;
        }
    }

    pub fn last_tier(&self) -> Option<&TierResult> {
        self.tiers.last()
    }

    pub fn ran(&self, validator_id: &str) -> bool {
        self.routing.get(validator_id) == Some(&RoutingDecision::Ran)
    }

    /// Every issue across all tiers, in tier order.
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.tiers
            .iter()
            .flat_map(|tier| tier.issues.values().flatten())
    }
}
