pub mod analyzer;
pub mod handlers;
pub mod models;
pub mod prompts;
