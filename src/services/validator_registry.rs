//! Static validator registry.
//!
//! Maps configured validator ids to implementations. Populated once at
//! startup and handed to the router, which resolves every declared validator
//! against it before the first run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::Validator;

/// Registry of available validators, keyed by id.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: BTreeMap<String, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator under its own id, replacing any previous entry.
    pub fn register(&mut self, validator: Arc<dyn Validator>) -> &mut Self {
        self.validators
            .insert(validator.id().to_string(), validator);
        self
    }

    /// Builder-style registration.
    pub fn with(mut self, validator: Arc<dyn Validator>) -> Self {
        self.register(validator);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(id).cloned()
    }

    /// Look up a validator, failing with a configuration error when absent.
    pub fn resolve(&self, id: &str) -> DomainResult<Arc<dyn Validator>> {
        self.get(id)
            .ok_or_else(|| DomainError::MissingImplementation(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.validators.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}
