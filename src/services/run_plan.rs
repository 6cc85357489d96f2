//! Run plan resolution.
//!
//! Turns the static validation configuration plus the per-run inputs
//! (explicit validator selection, profile, document family) into the concrete
//! list of validators each tier runs, their effective timeouts and the
//! failure budget for the run.
//!
//! Precedence, lowest to highest: global defaults, named profile, family
//! override, explicit user selection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EarlyTerminationConfig, RoutingOverride, TierDefinition, ValidationConfig,
};
use crate::services::dependency_resolver::{DependencyMap, DependencyResolver};

/// A validator selected to run, with its effective settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedValidator {
    pub id: String,
    /// Validator timeout, else tier timeout, else the run default.
    pub timeout: Duration,
    pub depends_on: Vec<String>,
}

/// Resolved plan for one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPlan {
    pub name: String,
    pub ordinal: u32,
    pub parallel: bool,
    /// Overall budget for the tier.
    pub timeout: Option<Duration>,
    /// Every validator the tier declares, in declaration order.
    pub declared: Vec<String>,
    /// Validators that run this time, in declaration order.
    pub selected: Vec<PlannedValidator>,
}

impl TierPlan {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().map(|v| v.id.clone()).collect()
    }

    /// Declared validators that do not run this time.
    pub fn unselected_ids(&self) -> Vec<String> {
        self.declared
            .iter()
            .filter(|id| !self.selected.iter().any(|v| &v.id == *id))
            .cloned()
            .collect()
    }

    pub fn dependency_map(&self) -> DependencyMap {
        self.selected
            .iter()
            .map(|v| (v.id.clone(), v.depends_on.clone()))
            .collect()
    }
}

/// Resolved plan for a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub profile: Option<String>,
    pub family: Option<String>,
    /// Tiers in ordinal order.
    pub tiers: Vec<TierPlan>,
    pub early_termination: EarlyTerminationConfig,
    pub default_timeout: Duration,
}

impl RunPlan {
    /// Resolve the plan for one run.
    ///
    /// `profile` falls back to the configured default profile. An unknown
    /// profile or an explicit selection naming an undeclared validator is a
    /// configuration error. An unknown family simply applies no override.
    pub fn resolve(
        config: &ValidationConfig,
        validator_set: Option<&[String]>,
        profile: Option<&str>,
        family: Option<&str>,
    ) -> DomainResult<Self> {
        let profile_name = profile
            .map(str::to_string)
            .or_else(|| config.default_profile.clone());

        let profile_override = match &profile_name {
            Some(name) => Some(
                config
                    .profiles
                    .get(name)
                    .ok_or_else(|| DomainError::UnknownProfile(name.clone()))?,
            ),
            None => None,
        };

        let family_override = family.and_then(|f| config.families.get(f));
        if let Some(f) = family {
            if family_override.is_none() {
                tracing::debug!(family = f, "No family override configured");
            }
        }

        let explicit: Option<HashSet<&str>> = match validator_set {
            Some(ids) => {
                for id in ids {
                    if config.validator(id).is_none() {
                        return Err(DomainError::UnknownValidator {
                            id: id.clone(),
                            context: "explicit validator selection".to_string(),
                        });
                    }
                }
                Some(ids.iter().map(String::as_str).collect())
            }
            None => None,
        };

        let layers: Vec<&RoutingOverride> = profile_override
            .into_iter()
            .chain(family_override)
            .collect();

        let mut early_termination = config.early_termination.clone();
        let mut default_timeout_secs = config.default_timeout_secs;
        for layer in &layers {
            apply_thresholds(layer, &mut early_termination, &mut default_timeout_secs);
        }
        let default_timeout = Duration::from_secs(default_timeout_secs);

        let tiers = config
            .ordered_tiers()
            .into_iter()
            .map(|tier| {
                let tier_enabled = layers
                    .iter()
                    .fold(tier.enabled, |acc, l| *l.tiers.get(&tier.name).unwrap_or(&acc));

                let selected = tier
                    .validators
                    .iter()
                    .filter_map(|id| config.validator(id))
                    .filter(|descriptor| match &explicit {
                        Some(set) => set.contains(descriptor.id.as_str()),
                        None => {
                            tier_enabled
                                && layers.iter().fold(descriptor.enabled, |acc, l| {
                                    *l.validators.get(&descriptor.id).unwrap_or(&acc)
                                })
                        }
                    })
                    .map(|descriptor| PlannedValidator {
                        id: descriptor.id.clone(),
                        timeout: descriptor
                            .timeout_secs
                            .or(tier.timeout_secs)
                            .map_or(default_timeout, Duration::from_secs),
                        depends_on: descriptor.depends_on.clone(),
                    })
                    .collect();

                TierPlan {
                    name: tier.name.clone(),
                    ordinal: tier.ordinal,
                    parallel: tier.parallel,
                    timeout: tier.timeout_secs.map(Duration::from_secs),
                    declared: tier.validators.clone(),
                    selected,
                }
            })
            .collect();

        Ok(Self {
            profile: profile_name,
            family: family.map(str::to_string),
            tiers,
            early_termination,
            default_timeout,
        })
    }

    pub fn selected_count(&self) -> usize {
        self.tiers.iter().map(|t| t.selected.len()).sum()
    }
}

fn apply_thresholds(
    layer: &RoutingOverride,
    early_termination: &mut EarlyTerminationConfig,
    default_timeout_secs: &mut u64,
) {
    if let Some(v) = layer.early_termination_on_critical {
        early_termination.early_termination_on_critical = v;
    }
    if let Some(v) = layer.max_critical_errors {
        early_termination.max_critical_errors = v;
    }
    if let Some(v) = layer.stop_on_tier_timeout {
        early_termination.stop_on_tier_timeout = v;
    }
    if let Some(v) = layer.default_timeout_secs {
        *default_timeout_secs = v;
    }
}

/// Check the validation topology for configuration errors.
///
/// Covers tier ordinals and names, validator declarations and references,
/// dependency placement (same or earlier tier), dependency cycles, override
/// references and the default profile.
pub fn validate_topology(config: &ValidationConfig) -> DomainResult<()> {
    if config.default_timeout_secs == 0 {
        return Err(DomainError::InvalidConfig(
            "default_timeout_secs must be greater than 0".to_string(),
        ));
    }
    if config.early_termination.max_critical_errors == 0 {
        return Err(DomainError::InvalidConfig(
            "max_critical_errors must be at least 1".to_string(),
        ));
    }

    let mut ordinals: HashMap<u32, &str> = HashMap::new();
    let mut names: HashSet<&str> = HashSet::new();
    for tier in &config.tiers {
        if let Some(first) = ordinals.insert(tier.ordinal, &tier.name) {
            return Err(DomainError::DuplicateTierOrdinal {
                ordinal: tier.ordinal,
                first: first.to_string(),
                second: tier.name.clone(),
            });
        }
        if !names.insert(&tier.name) {
            return Err(DomainError::InvalidConfig(format!(
                "tier name '{}' is used more than once",
                tier.name
            )));
        }
    }

    let mut declared: HashSet<&str> = HashSet::new();
    for validator in &config.validators {
        if !declared.insert(&validator.id) {
            return Err(DomainError::DuplicateValidator(validator.id.clone()));
        }
    }

    let mut placement: HashMap<&str, &TierDefinition> = HashMap::new();
    for tier in &config.tiers {
        for id in &tier.validators {
            if !declared.contains(id.as_str()) {
                return Err(DomainError::UnknownValidator {
                    id: id.clone(),
                    context: format!("tier '{}'", tier.name),
                });
            }
            if let Some(other) = placement.insert(id, tier) {
                return Err(DomainError::InvalidConfig(format!(
                    "validator '{}' is listed in tiers '{}' and '{}'",
                    id, other.name, tier.name
                )));
            }
        }
    }

    let resolver = DependencyResolver::new();
    let dependencies: DependencyMap = config
        .validators
        .iter()
        .map(|v| (v.id.clone(), v.depends_on.clone()))
        .collect();
    resolver.validate_dependencies(&dependencies, &declared)?;

    for validator in &config.validators {
        let Some(own_tier) = placement.get(validator.id.as_str()) else {
            continue;
        };
        for dep in &validator.depends_on {
            match placement.get(dep.as_str()) {
                Some(dep_tier) if dep_tier.ordinal <= own_tier.ordinal => {}
                Some(_) => {
                    return Err(DomainError::DependencyOutOfOrder {
                        validator: validator.id.clone(),
                        dependency: dep.clone(),
                    })
                }
                None => {
                    return Err(DomainError::InvalidConfig(format!(
                        "validator '{}' depends on '{}', which is not placed in any tier",
                        validator.id, dep
                    )))
                }
            }
        }
    }

    for tier in &config.tiers {
        if tier.parallel {
            let has_in_tier_deps = tier.validators.iter().any(|id| {
                dependencies[id]
                    .iter()
                    .any(|d| tier.validators.contains(d))
            });
            if has_in_tier_deps {
                tracing::debug!(
                    tier = %tier.name,
                    "In-tier dependencies are ignored because the tier runs in parallel"
                );
            }
        }
        resolver.execution_order(&tier.validators, &dependencies)?;
    }

    for (kind, overrides) in [("profile", &config.profiles), ("family", &config.families)] {
        for (name, layer) in overrides {
            validate_override(kind, name, layer, &names, &declared)?;
        }
    }

    if let Some(profile) = &config.default_profile {
        if !config.profiles.contains_key(profile) {
            return Err(DomainError::UnknownProfile(profile.clone()));
        }
    }

    Ok(())
}

fn validate_override(
    kind: &str,
    name: &str,
    layer: &RoutingOverride,
    tier_names: &HashSet<&str>,
    declared: &HashSet<&str>,
) -> DomainResult<()> {
    if let Some(tier) = layer.tiers.keys().find(|t| !tier_names.contains(t.as_str())) {
        return Err(DomainError::InvalidConfig(format!(
            "{kind} '{name}' references unknown tier '{tier}'"
        )));
    }
    if let Some(id) = layer
        .validators
        .keys()
        .find(|v| !declared.contains(v.as_str()))
    {
        return Err(DomainError::UnknownValidator {
            id: id.clone(),
            context: format!("{kind} '{name}'"),
        });
    }
    if layer.max_critical_errors == Some(0) {
        return Err(DomainError::InvalidConfig(format!(
            "{kind} '{name}': max_critical_errors must be at least 1"
        )));
    }
    if layer.default_timeout_secs == Some(0) {
        return Err(DomainError::InvalidConfig(format!(
            "{kind} '{name}': default_timeout_secs must be greater than 0"
        )));
    }
    Ok(())
}
