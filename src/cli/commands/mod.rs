//! CLI command implementations.

pub mod config;
pub mod critique;
pub mod plan;
