//! Validation router.
//!
//! Entry point of a validation run: resolves the run plan, walks the tiers in
//! ordinal order, merges each tier into the flow result and consults the
//! early termination controller at every tier boundary.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{FlowResult, ValidationConfig, ValidationContext};
use crate::services::early_termination::EarlyTerminationController;
use crate::services::run_plan::{validate_topology, RunPlan};
use crate::services::tier_executor::TierExecutor;
use crate::services::validator_registry::ValidatorRegistry;

/// Routes content through the configured validation tiers.
#[derive(Debug, Clone)]
pub struct ValidationRouter {
    config: ValidationConfig,
    executor: TierExecutor,
}

impl ValidationRouter {
    /// Build a router, rejecting invalid topologies and tier validators with
    /// no registered implementation before anything runs.
    pub fn new(config: ValidationConfig, registry: ValidatorRegistry) -> DomainResult<Self> {
        validate_topology(&config)?;
        for tier in &config.tiers {
            for id in &tier.validators {
                registry.resolve(id)?;
            }
        }

        Ok(Self {
            config,
            executor: TierExecutor::new(registry),
        })
    }

    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Resolve the plan a call to [`execute`](Self::execute) would follow.
    pub fn plan(
        &self,
        validator_set: Option<&[String]>,
        profile: Option<&str>,
        family: Option<&str>,
    ) -> DomainResult<RunPlan> {
        RunPlan::resolve(&self.config, validator_set, profile, family)
    }

    /// Validate `content`.
    ///
    /// The document family is taken from `context`. Configuration problems
    /// are returned before any validator runs; validator failures and early
    /// termination are reported inside the [`FlowResult`].
    #[instrument(skip_all, fields(profile = profile.unwrap_or("default"), family = context.family.as_deref().unwrap_or("none")))]
    pub async fn execute(
        &self,
        content: &str,
        context: &ValidationContext,
        validator_set: Option<&[String]>,
        profile: Option<&str>,
    ) -> DomainResult<FlowResult> {
        let plan = self.plan(validator_set, profile, context.family.as_deref())?;
        let controller = EarlyTerminationController::new(plan.early_termination.clone());

        let mut flow = FlowResult::new(plan.profile.clone(), plan.family.clone());
        info!(
            run_id = %flow.run_id,
            tiers = plan.tiers.len(),
            validators = plan.selected_count(),
            "Starting validation run"
        );

        let start = Instant::now();
        let content: Arc<str> = Arc::from(content);
        let context = Arc::new(context.clone());

        for (index, tier) in plan.tiers.iter().enumerate() {
            if tier.is_empty() {
                info!(tier = %tier.name, "No validators selected, skipping tier");
                flow.mark_skipped(&tier.declared);
                continue;
            }

            let execution = self
                .executor
                .run(tier, Arc::clone(&content), Arc::clone(&context))
                .await?;
            flow.absorb_tier(execution.result, execution.runs);
            flow.mark_skipped(&tier.unselected_ids());

            let decision = controller.should_stop(&flow);
            if decision.stop {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| format!("stopped after {}", tier.name));
                warn!(tier = %tier.name, reason = %reason, "Terminating validation early");
                flow.terminate(reason);
                for later in &plan.tiers[index + 1..] {
                    flow.mark_skipped(&later.declared);
                }
                break;
            }
        }

        flow.total_duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            run_id = %flow.run_id,
            duration_ms = flow.total_duration_ms,
            critical = flow.counts.critical,
            terminated_early = flow.terminated_early,
            "Validation run finished"
        );
        Ok(flow)
    }
}
