//! Plan CLI command: resolve a run plan without executing validators.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::Config;
use crate::services::{DependencyMap, DependencyResolver, RunPlan, TierPlan};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Named routing profile (defaults to validation.default_profile)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Document family for family-specific overrides
    #[arg(short, long)]
    pub family: Option<String>,

    /// Explicit validator selection (comma-separated); overrides profile flags
    #[arg(short, long, value_delimiter = ',')]
    pub validators: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlannedValidatorOutput {
    pub id: String,
    /// "run" or "skipped"
    pub status: &'static str,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TierPlanOutput {
    pub name: String,
    pub ordinal: u32,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub validators: Vec<PlannedValidatorOutput>,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub profile: Option<String>,
    pub family: Option<String>,
    pub default_timeout_secs: u64,
    pub early_termination_on_critical: bool,
    pub max_critical_errors: usize,
    pub stop_on_tier_timeout: bool,
    pub selected_count: usize,
    pub tiers: Vec<TierPlanOutput>,
}

impl PlanOutput {
    pub fn build(config: &Config, plan: &RunPlan) -> Result<Self> {
        let resolver = DependencyResolver::new();
        let all_dependencies: DependencyMap = config
            .validation
            .validators
            .iter()
            .map(|v| (v.id.clone(), v.depends_on.clone()))
            .collect();

        let tiers = plan
            .tiers
            .iter()
            .map(|tier| tier_output(&resolver, tier, &all_dependencies))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            profile: plan.profile.clone(),
            family: plan.family.clone(),
            default_timeout_secs: plan.default_timeout.as_secs(),
            early_termination_on_critical: plan.early_termination.early_termination_on_critical,
            max_critical_errors: plan.early_termination.max_critical_errors,
            stop_on_tier_timeout: plan.early_termination.stop_on_tier_timeout,
            selected_count: plan.selected_count(),
            tiers,
        })
    }
}

fn tier_output(
    resolver: &DependencyResolver,
    tier: &TierPlan,
    all_dependencies: &DependencyMap,
) -> Result<TierPlanOutput> {
    let selected_ids = tier.selected_ids();
    let order = if tier.parallel {
        selected_ids
    } else {
        resolver
            .execution_order(&selected_ids, &tier.dependency_map())
            .with_context(|| format!("Failed to order validators in {}", tier.name))?
    };

    let mut validators = Vec::with_capacity(tier.declared.len());
    for id in &order {
        let planned = tier.selected.iter().find(|v| &v.id == id);
        validators.push(PlannedValidatorOutput {
            id: id.clone(),
            status: "run",
            depth: resolver.calculate_depth(id, all_dependencies)?,
            timeout_secs: planned.map(|v| v.timeout.as_secs()),
            depends_on: planned.map(|v| v.depends_on.clone()).unwrap_or_default(),
        });
    }
    for id in tier.unselected_ids() {
        validators.push(PlannedValidatorOutput {
            depth: resolver.calculate_depth(&id, all_dependencies)?,
            depends_on: all_dependencies.get(&id).cloned().unwrap_or_default(),
            id,
            status: "skipped",
            timeout_secs: None,
        });
    }

    Ok(TierPlanOutput {
        name: tier.name.clone(),
        ordinal: tier.ordinal,
        mode: if tier.parallel { "parallel" } else { "sequential" },
        timeout_secs: tier.timeout.map(|t| t.as_secs()),
        validators,
    })
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Profile: {}   Family: {}   Validators to run: {}",
            self.profile.as_deref().unwrap_or("default"),
            self.family.as_deref().unwrap_or("none"),
            self.selected_count
        )];
        lines.push(format!(
            "Early termination: {} (max critical errors {}), stop on tier timeout: {}",
            if self.early_termination_on_critical { "on" } else { "off" },
            self.max_critical_errors,
            self.stop_on_tier_timeout
        ));

        for tier in &self.tiers {
            lines.push(String::new());
            lines.push(format!(
                "{} (#{}, {}, timeout {})",
                tier.name,
                tier.ordinal,
                tier.mode,
                tier.timeout_secs
                    .map_or_else(|| "none".to_string(), |t| format!("{t}s"))
            ));

            let mut table = list_table(&["validator", "status", "depth", "timeout", "depends on"]);
            for v in &tier.validators {
                table.add_row(vec![
                    v.id.clone(),
                    v.status.to_string(),
                    v.depth.to_string(),
                    v.timeout_secs.map_or_else(|| "-".to_string(), |t| format!("{t}s")),
                    if v.depends_on.is_empty() {
                        "-".to_string()
                    } else {
                        v.depends_on.join(", ")
                    },
                ]);
            }
            lines.push(table.to_string());
        }

        lines.join("\n")
    }
}

pub fn execute(args: PlanArgs, config: &Config, json_mode: bool) -> Result<()> {
    let selection = (!args.validators.is_empty()).then_some(args.validators.as_slice());
    let plan = RunPlan::resolve(
        &config.validation,
        selection,
        args.profile.as_deref(),
        args.family.as_deref(),
    )?;

    output(&PlanOutput::build(config, &plan)?, json_mode);
    Ok(())
}
