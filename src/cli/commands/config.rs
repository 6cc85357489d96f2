//! Config CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration and print a summary
    Check,
    /// Print the effective configuration as YAML
    Show,
}

#[derive(Debug, Serialize)]
pub struct TierSummary {
    pub name: String,
    pub ordinal: u32,
    pub mode: &'static str,
    pub enabled: bool,
    pub validators: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigCheckOutput {
    pub valid: bool,
    pub tiers: Vec<TierSummary>,
    pub validator_count: usize,
    pub profiles: Vec<String>,
    pub families: Vec<String>,
    pub default_profile: Option<String>,
    pub critic_enabled: bool,
    pub critic_uses_llm: bool,
    pub dedup_enabled: bool,
    pub dedup_method: String,
    pub llm_configured: bool,
}

impl ConfigCheckOutput {
    pub fn from_config(config: &Config) -> Self {
        let mut tiers: Vec<TierSummary> = config
            .validation
            .tiers
            .iter()
            .map(|tier| TierSummary {
                name: tier.name.clone(),
                ordinal: tier.ordinal,
                mode: if tier.parallel { "parallel" } else { "sequential" },
                enabled: tier.enabled,
                validators: tier.validators.clone(),
            })
            .collect();
        tiers.sort_by_key(|t| t.ordinal);

        Self {
            valid: true,
            tiers,
            validator_count: config.validation.validators.len(),
            profiles: config.validation.profiles.keys().cloned().collect(),
            families: config.validation.families.keys().cloned().collect(),
            default_profile: config.validation.default_profile.clone(),
            critic_enabled: config.critic.enabled,
            critic_uses_llm: config.critic.use_llm,
            dedup_enabled: config.dedup.enabled,
            dedup_method: format!("{:?}", config.dedup.method).to_lowercase(),
            llm_configured: config.llm.base_url.is_some(),
        }
    }
}

impl CommandOutput for ConfigCheckOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["ordinal", "tier", "mode", "enabled", "validators"]);
        for tier in &self.tiers {
            table.add_row(vec![
                tier.ordinal.to_string(),
                tier.name.clone(),
                tier.mode.to_string(),
                tier.enabled.to_string(),
                tier.validators.join(", "),
            ]);
        }

        let join_or_none = |items: &[String]| {
            if items.is_empty() {
                "none".to_string()
            } else {
                items.join(", ")
            }
        };

        let mut lines = vec![
            "Configuration is valid.".to_string(),
            String::new(),
            table.to_string(),
            String::new(),
            format!("Validators:      {}", self.validator_count),
            format!("Profiles:        {}", join_or_none(&self.profiles)),
            format!("Families:        {}", join_or_none(&self.families)),
            format!(
                "Default profile: {}",
                self.default_profile.as_deref().unwrap_or("none")
            ),
            format!(
                "Critic:          {}{}",
                if self.critic_enabled { "enabled" } else { "disabled" },
                if self.critic_uses_llm { " (LLM-assisted)" } else { "" }
            ),
            format!(
                "Deduplication:   {}",
                if self.dedup_enabled {
                    self.dedup_method.as_str()
                } else {
                    "disabled"
                }
            ),
        ];
        if self.critic_uses_llm && !self.llm_configured {
            lines.push("Warning: critic.use_llm is set but llm.base_url is not; rules only.".into());
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigShowOutput {
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config)
            .unwrap_or_else(|e| format!("Failed to render configuration: {e}"))
    }
}

pub fn execute(args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Check => output(&ConfigCheckOutput::from_config(config), json_mode),
        ConfigCommands::Show => output(
            &ConfigShowOutput {
                config: config.clone(),
            },
            json_mode,
        ),
    }
    Ok(())
}
