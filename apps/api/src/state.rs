use crate::analysis::analyzer::ResumeAnalyzer;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Wraps the configured LLM backend behind `Arc<dyn Completion>`.
    pub analyzer: ResumeAnalyzer,
    pub config: Config,
}
