//! Failure budget evaluated between tiers.

use crate::domain::models::{EarlyTerminationConfig, FlowResult};

/// Whether the flow should stop before the next tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopDecision {
    pub stop: bool,
    pub reason: Option<String>,
}

impl StopDecision {
    pub const fn proceed() -> Self {
        Self {
            stop: false,
            reason: None,
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            stop: true,
            reason: Some(reason.into()),
        }
    }
}

/// Decides at tier boundaries whether remaining tiers are skipped.
#[derive(Debug, Clone)]
pub struct EarlyTerminationController {
    config: EarlyTerminationConfig,
}

impl EarlyTerminationController {
    pub const fn new(config: EarlyTerminationConfig) -> Self {
        Self { config }
    }

    /// Evaluate the flow after its most recent tier was merged.
    ///
    /// Critical counts are cumulative across every completed tier.
    pub fn should_stop(&self, flow: &FlowResult) -> StopDecision {
        let Some(tier) = flow.last_tier() else {
            return StopDecision::proceed();
        };

        let critical = flow.counts.critical;
        if self.config.early_termination_on_critical
            && critical >= self.config.max_critical_errors
        {
            return StopDecision::stop(format!(
                "critical errors in {}: {} >= {}",
                tier.tier_name, critical, self.config.max_critical_errors
            ));
        }

        if self.config.stop_on_tier_timeout && tier.timed_out {
            return StopDecision::stop(format!("tier {} exceeded its timeout", tier.tier_name));
        }

        StopDecision::proceed()
    }
}
