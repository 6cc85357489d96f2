//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure
//! - HTTP adapters for the critique service and embedding provider
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod llm;
pub mod logging;
