//! Resume feedback and job matching over one completion backend.
//!
//! Flow per request: build prompt → complete (retried on rate limit) →
//! strip fences → parse JSON → validate shape. Either a complete, validated
//! result comes back or an `AnalysisError` does; there is no partial result.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::models::{JobMatchResult, ResumeAnalysisResult, Validate};
use crate::analysis::prompts::{
    ANALYZE_PROMPT_TEMPLATE, ANALYZE_SYSTEM, MATCH_PROMPT_TEMPLATE, MATCH_SYSTEM,
};
use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM, SCORE_RANGE_INSTRUCTION};
use crate::llm_client::retry::{retry_with_backoff, RetryError, RetryHooks, RetryPolicy};
use crate::llm_client::{parse_json_response, Completion, LlmError};

/// Which of the two analysis flows a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ResumeAnalysis,
    JobMatch,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ResumeAnalysis => f.write_str("resume analysis"),
            Operation::JobMatch => f.write_str("job match"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{operation} rate limited after {retries} retries: {source}")]
    RateLimited {
        operation: Operation,
        retries: u32,
        #[source]
        source: LlmError,
    },

    #[error("{operation} rejected by provider configuration: {source}")]
    InvalidConfiguration {
        operation: Operation,
        #[source]
        source: LlmError,
    },

    #[error("{operation} failed: {reason}")]
    AnalysisFailed { operation: Operation, reason: String },

    #[error("{operation} cancelled")]
    Cancelled { operation: Operation },
}

impl AnalysisError {
    pub fn operation(&self) -> Operation {
        match self {
            AnalysisError::RateLimited { operation, .. }
            | AnalysisError::InvalidConfiguration { operation, .. }
            | AnalysisError::AnalysisFailed { operation, .. }
            | AnalysisError::Cancelled { operation } => *operation,
        }
    }
}

/// Stateless between calls; cheap to clone into handlers and spawned tasks.
#[derive(Clone)]
pub struct ResumeAnalyzer {
    backend: Arc<dyn Completion>,
    retry: RetryPolicy,
}

impl ResumeAnalyzer {
    pub fn new(backend: Arc<dyn Completion>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Structured feedback (scores, strengths, weaknesses) for one resume.
    pub async fn analyze(
        &self,
        resume_text: &str,
        hooks: &RetryHooks,
    ) -> Result<ResumeAnalysisResult, AnalysisError> {
        let prompt = fill_template(
            ANALYZE_PROMPT_TEMPLATE,
            &[
                ("score_instruction", SCORE_RANGE_INSTRUCTION),
                ("resume_text", resume_text),
            ],
        );
        let system = format!("{ANALYZE_SYSTEM} {JSON_ONLY_SYSTEM}");

        let result: ResumeAnalysisResult = self
            .run(Operation::ResumeAnalysis, &prompt, &system, hooks)
            .await?;
        info!(
            "Resume analysed: ats_score={}, readability_score={}, skills={}",
            result.ats_score,
            result.readability_score,
            result.skills.len()
        );
        Ok(result)
    }

    /// Match percentage and skill coverage of a resume against a job description.
    pub async fn match_job(
        &self,
        resume_text: &str,
        job_description: &str,
        hooks: &RetryHooks,
    ) -> Result<JobMatchResult, AnalysisError> {
        let prompt = fill_template(
            MATCH_PROMPT_TEMPLATE,
            &[
                ("score_instruction", SCORE_RANGE_INSTRUCTION),
                ("resume_text", resume_text),
                ("job_description", job_description),
            ],
        );
        let system = format!("{MATCH_SYSTEM} {JSON_ONLY_SYSTEM}");

        let result: JobMatchResult = self.run(Operation::JobMatch, &prompt, &system, hooks).await?;
        info!(
            "Job matched: percentage={}, matching={}, missing={}",
            result.percentage,
            result.matching_skills.len(),
            result.missing_skills.len()
        );
        Ok(result)
    }

    async fn run<T>(
        &self,
        operation: Operation,
        prompt: &str,
        system: &str,
        hooks: &RetryHooks,
    ) -> Result<T, AnalysisError>
    where
        T: DeserializeOwned + Validate,
    {
        let text = retry_with_backoff(&self.retry, hooks, LlmError::is_rate_limited, || {
            self.backend.complete(prompt, system)
        })
        .await
        .map_err(|e| self.classify(operation, e))?;

        let parsed: T = parse_json_response(&text).map_err(|e| {
            warn!("{operation}: model output is not the expected JSON: {e}");
            AnalysisError::AnalysisFailed {
                operation,
                reason: e.to_string(),
            }
        })?;

        parsed.validate().map_err(|reason| {
            warn!("{operation}: model output failed validation: {reason}");
            AnalysisError::AnalysisFailed { operation, reason }
        })?;

        Ok(parsed)
    }

    fn classify(&self, operation: Operation, error: RetryError<LlmError>) -> AnalysisError {
        match error {
            RetryError::Cancelled => AnalysisError::Cancelled { operation },
            RetryError::Failed(source) if source.is_rate_limited() => AnalysisError::RateLimited {
                operation,
                retries: self.retry.max_retries,
                source,
            },
            RetryError::Failed(source) if source.is_configuration_error() => {
                AnalysisError::InvalidConfiguration { operation, source }
            }
            RetryError::Failed(source) => AnalysisError::AnalysisFailed {
                operation,
                reason: source.to_string(),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm_client::{Completion, LlmError};

    /// Completion backend that replays canned responses in order.
    #[derive(Default)]
    pub struct ScriptedCompletion {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicU32,
    }

    impl ScriptedCompletion {
        pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Completion for ScriptedCompletion {
        async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent))
        }
    }

    pub fn rate_limited() -> Result<String, LlmError> {
        Err(LlmError::Api {
            status: 429,
            message: "Resource has been exhausted (e.g. check quota).".to_string(),
        })
    }

    pub const ANALYSIS_RESPONSE: &str = r#"```json
{
  "personalInfo": {"name": "Jane Doe", "email": "jane@example.com"},
  "workExperience": {"roles": ["Backend Engineer"], "achievements": ["Shipped billing v2"], "impact": ["Reduced churn 5%"]},
  "education": {"degrees": ["BSc Computer Science"], "certifications": ["AWS SAA"]},
  "skills": ["Rust", "Kubernetes"],
  "atsScore": 78,
  "readabilityScore": 85,
  "suggestions": {"strengths": ["Clear metrics"], "weaknesses": ["Dense layout"], "improvements": ["Add a summary"]}
}
```"#;

    pub const MATCH_RESPONSE: &str = r#"{"percentage": 72, "matchingSkills": ["Rust", "PostgreSQL"], "missingSkills": ["Kafka"], "suggestions": ["Highlight event-driven work"]}"#;
}
