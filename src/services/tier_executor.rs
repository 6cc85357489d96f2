//! Tier executor.
//!
//! Runs the validators selected for one tier. Parallel tiers fan every
//! validator out at once and join on all of them. Dependency-ordered tiers
//! launch each validator as soon as its in-tier dependencies have finished,
//! so independent validators still overlap.
//!
//! Failures never escape a tier: errors, panics and timeouts become
//! [`ValidatorOutcome`] values and, through them, synthetic issues.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    SeverityCounts, TierResult, ValidationContext, ValidatorOutcome, ValidatorRun,
};
use crate::domain::ports::Validator;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::run_plan::{PlannedValidator, TierPlan};
use crate::services::validator_registry::ValidatorRegistry;

/// A finished tier: the aggregated result plus the raw validator runs.
#[derive(Debug, Clone)]
pub struct TierExecution {
    pub result: TierResult,
    /// Runs in launch order.
    pub runs: Vec<ValidatorRun>,
}

/// Time granted to one validator.
#[derive(Debug, Clone, Copy)]
enum Budget {
    /// The validator's own effective timeout.
    Own(Duration),
    /// Cut short by the tier deadline.
    Clamped(Duration),
    /// The tier deadline passed before launch.
    Expired,
}

impl Budget {
    fn compute(own: Duration, deadline: Option<Instant>) -> Self {
        let Some(deadline) = deadline else {
            return Self::Own(own);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            Self::Expired
        } else if remaining < own {
            Self::Clamped(remaining)
        } else {
            Self::Own(own)
        }
    }
}

/// A spawned validator task.
struct Launched {
    id: String,
    started_at: DateTime<Utc>,
    clamped: bool,
    handle: JoinHandle<ValidatorRun>,
}

/// Result of trying to start a validator.
enum Launch {
    Spawned(Launched),
    Expired(Finished),
}

/// A finished validator task, joined.
struct Finished {
    run: ValidatorRun,
    hit_tier_deadline: bool,
}

/// Executes the validators of a single tier.
#[derive(Debug, Clone)]
pub struct TierExecutor {
    registry: ValidatorRegistry,
    resolver: DependencyResolver,
}

impl TierExecutor {
    pub const fn new(registry: ValidatorRegistry) -> Self {
        Self {
            registry,
            resolver: DependencyResolver::new(),
        }
    }

    /// Run every selected validator of `tier` and aggregate the outcome.
    ///
    /// Only configuration problems (a selected validator with no registered
    /// implementation, an in-tier dependency cycle) are returned as errors.
    #[instrument(skip_all, fields(tier = %tier.name))]
    pub async fn run(
        &self,
        tier: &TierPlan,
        content: Arc<str>,
        context: Arc<ValidationContext>,
    ) -> DomainResult<TierExecution> {
        let start = Instant::now();
        let deadline = tier.timeout.map(|t| start + t);

        info!(
            validators = tier.selected.len(),
            parallel = tier.parallel,
            "Running tier"
        );

        let finished = if tier.parallel {
            self.run_parallel(tier, deadline, &content, &context).await?
        } else {
            self.run_ordered(tier, deadline, &content, &context).await?
        };

        let timed_out = finished.iter().any(|f| f.hit_tier_deadline);
        let runs: Vec<ValidatorRun> = finished.into_iter().map(|f| f.run).collect();

        let mut counts = SeverityCounts::default();
        let mut issues = BTreeMap::new();
        for run in &runs {
            let run_issues = run.issues();
            counts.absorb(&SeverityCounts::from_issues(&run_issues));
            issues.insert(run.validator_id.clone(), run_issues);
        }

        let duration_ms = elapsed_ms(start);
        if timed_out {
            warn!(duration_ms, "Tier exceeded its timeout");
        }
        info!(
            duration_ms,
            critical = counts.critical,
            errors = counts.error,
            "Tier finished"
        );

        let result = TierResult {
            tier_name: tier.name.clone(),
            ordinal: tier.ordinal,
            parallel: tier.parallel,
            validators_run: runs.iter().map(|r| r.validator_id.clone()).collect(),
            issues,
            counts,
            duration_ms,
            timed_out,
            terminated_early: false,
        };

        Ok(TierExecution { result, runs })
    }

    async fn run_parallel(
        &self,
        tier: &TierPlan,
        deadline: Option<Instant>,
        content: &Arc<str>,
        context: &Arc<ValidationContext>,
    ) -> DomainResult<Vec<Finished>> {
        let mut launched = Vec::with_capacity(tier.selected.len());
        for planned in &tier.selected {
            let validator = self.registry.resolve(&planned.id)?;
            launched.push(launch(validator, planned, deadline, content, context));
        }

        // Join on every task; one failure never cancels the rest.
        let mut finished = Vec::with_capacity(launched.len());
        for task in launched {
            finished.push(match task {
                Launch::Spawned(task) => join(task).await,
                Launch::Expired(expired) => expired,
            });
        }
        Ok(finished)
    }

    async fn run_ordered(
        &self,
        tier: &TierPlan,
        deadline: Option<Instant>,
        content: &Arc<str>,
        context: &Arc<ValidationContext>,
    ) -> DomainResult<Vec<Finished>> {
        let ids = tier.selected_ids();
        let dependencies = tier.dependency_map();
        let order = self.resolver.execution_order(&ids, &dependencies)?;

        let members: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let by_id: HashMap<&str, &PlannedValidator> = tier
            .selected
            .iter()
            .map(|p| (p.id.as_str(), p))
            .collect();

        let mut pending: Vec<&PlannedValidator> =
            order.iter().filter_map(|id| by_id.get(id.as_str()).copied()).collect();
        let mut completed: HashSet<String> = HashSet::new();
        let mut running = FuturesUnordered::new();
        let mut launch_order: Vec<String> = Vec::with_capacity(pending.len());
        let mut finished: HashMap<String, Finished> = HashMap::new();

        loop {
            // Release everything whose in-tier dependencies have finished.
            // Expired validators finish immediately, which may release more.
            let mut released = true;
            while released {
                released = false;
                let mut i = 0;
                while i < pending.len() {
                    let planned = pending[i];
                    let ready = planned
                        .depends_on
                        .iter()
                        .filter(|d| members.contains(d.as_str()))
                        .all(|d| completed.contains(d));
                    if !ready {
                        i += 1;
                        continue;
                    }

                    pending.remove(i);
                    debug!(validator_id = %planned.id, "Dependencies satisfied");
                    launch_order.push(planned.id.clone());
                    let validator = self.registry.resolve(&planned.id)?;
                    match launch(validator, planned, deadline, content, context) {
                        Launch::Spawned(task) => running.push(join(task)),
                        Launch::Expired(expired) => {
                            completed.insert(planned.id.clone());
                            finished.insert(planned.id.clone(), expired);
                            released = true;
                        }
                    }
                }
            }

            match running.next().await {
                Some(done) => {
                    let id = done.run.validator_id.clone();
                    completed.insert(id.clone());
                    finished.insert(id, done);
                }
                None => break,
            }
        }

        Ok(launch_order
            .into_iter()
            .filter_map(|id| finished.remove(&id))
            .collect())
    }
}

/// Spawn one validator task, or record it as timed out when the tier
/// deadline has already passed.
fn launch(
    validator: Arc<dyn Validator>,
    planned: &PlannedValidator,
    deadline: Option<Instant>,
    content: &Arc<str>,
    context: &Arc<ValidationContext>,
) -> Launch {
    let started_at = Utc::now();
    let (budget, clamped) = match Budget::compute(planned.timeout, deadline) {
        Budget::Own(d) => (d, false),
        Budget::Clamped(d) => (d, true),
        Budget::Expired => {
            warn!(validator_id = %planned.id, "Tier deadline passed before launch");
            return Launch::Expired(Finished {
                run: ValidatorRun {
                    validator_id: planned.id.clone(),
                    outcome: ValidatorOutcome::TimedOut { after_ms: 0 },
                    started_at,
                    finished_at: started_at,
                    duration_ms: 0,
                },
                hit_tier_deadline: true,
            });
        }
    };

    let id = planned.id.clone();
    let content = Arc::clone(content);
    let context = Arc::clone(context);
    let handle = tokio::spawn(async move {
        let start = Instant::now();
        let outcome =
            match tokio::time::timeout(budget, validator.validate(&content, &context)).await {
                Ok(Ok(output)) => ValidatorOutcome::Completed(output),
                Ok(Err(e)) => ValidatorOutcome::Failed {
                    error: format!("{e:#}"),
                },
                Err(_) => ValidatorOutcome::TimedOut {
                    after_ms: millis(budget),
                },
            };
        ValidatorRun {
            validator_id: validator.id().to_string(),
            outcome,
            started_at,
            finished_at: Utc::now(),
            duration_ms: elapsed_ms(start),
        }
    });

    Launch::Spawned(Launched {
        id,
        started_at,
        clamped,
        handle,
    })
}

fn join(task: Launched) -> impl Future<Output = Finished> {
    async move {
        let Launched {
            id,
            started_at,
            clamped,
            handle,
        } = task;
        let mut run = handle
            .await
            .unwrap_or_else(|e| panicked_run(&id, started_at, &e));
        // Report under the configured id even if the implementation disagrees.
        run.validator_id = id;

        match &run.outcome {
            ValidatorOutcome::Completed(output) => debug!(
                validator_id = %run.validator_id,
                duration_ms = run.duration_ms,
                issues = output.issues.len(),
                "Validator completed"
            ),
            ValidatorOutcome::TimedOut { after_ms } => warn!(
                validator_id = %run.validator_id,
                after_ms,
                "Validator timed out"
            ),
            ValidatorOutcome::Failed { error } => warn!(
                validator_id = %run.validator_id,
                error = %error,
                "Validator failed"
            ),
        }

        let hit_tier_deadline =
            clamped && matches!(run.outcome, ValidatorOutcome::TimedOut { .. });
        Finished {
            run,
            hit_tier_deadline,
        }
    }
}

fn panicked_run(id: &str, started_at: DateTime<Utc>, err: &JoinError) -> ValidatorRun {
    let finished_at = Utc::now();
    ValidatorRun {
        validator_id: id.to_string(),
        outcome: ValidatorOutcome::Failed {
            error: format!("validator task aborted: {err}"),
        },
        started_at,
        finished_at,
        duration_ms: u64::try_from((finished_at - started_at).num_milliseconds()).unwrap_or(0),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms(start: Instant) -> u64 {
    millis(start.elapsed())
}
