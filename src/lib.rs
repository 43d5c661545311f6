//! Prism Library
//!
//! This library contains all the core modules for the Prism semantic query engine.

use std::sync::Arc;

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use services::{
    AnalysisMediator, CacheStore, DatabaseConnector, ExecutionRouter, LanguageModel, LlmClient,
    LocalCacheStore, MySqlConnector, ResultCache,
};

/// Application shared state
///
/// All services are wrapped in Arc for cheap cloning and thread safety; Rust's
/// type system is the DI container.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ExecutionRouter>,
    pub cache: Arc<ResultCache>,
    pub mediator: Arc<AnalysisMediator>,
}
