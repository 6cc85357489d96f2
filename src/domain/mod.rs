//! Domain layer for docval
//!
//! Core models, errors and the ports through which external collaborators
//! (validators, critique service, embedding provider) are consumed.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
