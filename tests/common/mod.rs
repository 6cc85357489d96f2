//! Common test utilities for integration tests
//!
//! Scripted validators and recommendation fixtures shared across the
//! integration test files.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docval::domain::models::{
    Recommendation, RecommendationSeverity, Severity, ValidationContext, ValidationIssue,
    ValidatorOutput,
};
use docval::domain::ports::Validator;
use docval::ValidatorRegistry;

/// Shared, ordered record of validator start and finish events.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Validator with a fixed delay and a fixed set of issues.
pub struct ScriptedValidator {
    id: String,
    delay: Duration,
    issues: Vec<(Severity, String)>,
    fail_with: Option<String>,
    calls: Arc<AtomicUsize>,
    events: Option<EventLog>,
}

impl ScriptedValidator {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            delay: Duration::ZERO,
            issues: Vec::new(),
            fail_with: None,
            calls: Arc::new(AtomicUsize::new(0)),
            events: None,
        }
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn with_issues(mut self, severity: Severity, count: usize) -> Self {
        for n in 0..count {
            self.issues
                .push((severity, format!("{} issue #{}", self.id, n + 1)));
        }
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn recording(mut self, events: &EventLog) -> Self {
        self.events = Some(Arc::clone(events));
        self
    }

    /// Handle to the number of times `validate` was entered.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn record(&self, event: &str) {
        if let Some(ref events) = self.events {
            events.lock().unwrap().push(format!("{event}:{}", self.id));
        }
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn validate(
        &self,
        _content: &str,
        _context: &ValidationContext,
    ) -> anyhow::Result<ValidatorOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.record("start");
        tokio::time::sleep(self.delay).await;
        self.record("end");

        if let Some(ref message) = self.fail_with {
            anyhow::bail!("{message}");
        }

        let issues = self
            .issues
            .iter()
            .map(|(severity, message)| {
                ValidationIssue::new(&self.id, "scripted", *severity, message.clone())
                    .with_suggestion(format!("resolve {message}"))
            })
            .collect::<Vec<_>>();
        let count = issues.len();
        Ok(ValidatorOutput::new(issues, 0.9).with_metric("issues_found", count.into()))
    }
}

/// Registry with a clean, instant validator for every id.
pub fn clean_registry(ids: &[&str]) -> ValidatorRegistry {
    ids.iter().fold(ValidatorRegistry::new(), |registry, id| {
        registry.with(Arc::new(ScriptedValidator::new(id)))
    })
}

/// A recommendation that passes every rule check.
pub fn good_recommendation(instruction: &str, scope: &str) -> Recommendation {
    Recommendation::new(instruction, scope, RecommendationSeverity::Medium)
        .with_rationale("Fixes the reported problem")
        .with_issue("structure", "Heading level skipped")
}
