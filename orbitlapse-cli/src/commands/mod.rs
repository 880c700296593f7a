//! CLI command implementations.

pub mod common;
pub mod config;
pub mod list;
pub mod search;
pub mod series;
pub mod sources;
