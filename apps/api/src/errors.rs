use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::analyzer::{AnalysisError, Operation};
use crate::extraction::{DocumentKind, ExtractionError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Wire shape of every error body: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Status, stable code, and the short message shown to users. Technical
    /// detail is logged here and never returned.
    pub fn public_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                format!(
                    "File is too large. Maximum size is {} MB.",
                    limit / (1024 * 1024)
                ),
            ),
            AppError::Extraction(e) => {
                tracing::warn!("Extraction error: {e}");
                match e {
                    ExtractionError::UnsupportedFormat { .. } => (
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "UNSUPPORTED_FORMAT",
                        "Unsupported file format. Please upload a PDF, DOCX, or TXT file."
                            .to_string(),
                    ),
                    ExtractionError::ExtractionFailed { kind, .. } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "EXTRACTION_FAILED",
                        match kind {
                            DocumentKind::Pdf => {
                                "Failed to convert PDF file. Please try a different file format."
                            }
                            DocumentKind::Word => {
                                "Failed to convert DOCX file. Please try a different file format."
                            }
                            DocumentKind::PlainText => "Failed to read text file. Please try again.",
                        }
                        .to_string(),
                    ),
                }
            }
            AppError::Analysis(e) => {
                tracing::error!("Analysis error: {e}");
                match e {
                    AnalysisError::RateLimited { .. } => (
                        StatusCode::TOO_MANY_REQUESTS,
                        "RATE_LIMITED",
                        "API rate limit exceeded. Please wait a moment before trying again."
                            .to_string(),
                    ),
                    AnalysisError::InvalidConfiguration { .. } => (
                        StatusCode::BAD_GATEWAY,
                        "INVALID_CONFIGURATION",
                        "Invalid API configuration. Please check your API key and settings."
                            .to_string(),
                    ),
                    AnalysisError::AnalysisFailed { .. } => (
                        StatusCode::BAD_GATEWAY,
                        "ANALYSIS_FAILED",
                        match e.operation() {
                            Operation::ResumeAnalysis => "An error occurred while analyzing the resume. Please try again later.",
                            Operation::JobMatch => "An error occurred while analyzing the job match. Please try again later.",
                        }
                        .to_string(),
                    ),
                    AnalysisError::Cancelled { .. } => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "CANCELLED",
                        "The analysis was cancelled.".to_string(),
                    ),
                }
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }

    pub fn body(&self) -> (StatusCode, ErrorBody) {
        let (status, code, message) = self.public_parts();
        (
            status,
            ErrorBody {
                error: ErrorDetail { code, message },
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.body();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;

    #[test]
    fn test_unsupported_format_message_names_supported_set() {
        let err = AppError::from(ExtractionError::UnsupportedFormat {
            media_type: "image/png".to_string(),
        });
        let (status, code, message) = err.public_parts();
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(code, "UNSUPPORTED_FORMAT");
        assert!(message.contains("PDF, DOCX, or TXT"));
    }

    #[test]
    fn test_extraction_failure_message_per_format() {
        let err = AppError::from(ExtractionError::ExtractionFailed {
            kind: DocumentKind::Word,
            reason: "zip: invalid archive".to_string(),
        });
        let (status, _, message) = err.public_parts();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(message.contains("DOCX"));
        assert!(!message.contains("zip"));
    }

    #[test]
    fn test_rate_limited_maps_to_429_without_provider_text() {
        let err = AppError::from(AnalysisError::RateLimited {
            operation: Operation::ResumeAnalysis,
            retries: 3,
            source: LlmError::Api {
                status: 429,
                message: "RESOURCE_EXHAUSTED: project 1234 quota".to_string(),
            },
        });
        let (status, code, message) = err.public_parts();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(code, "RATE_LIMITED");
        assert!(!message.contains("1234"));
    }

    #[test]
    fn test_analysis_failed_message_depends_on_operation() {
        let resume = AppError::from(AnalysisError::AnalysisFailed {
            operation: Operation::ResumeAnalysis,
            reason: "expected value at line 1".to_string(),
        });
        let job = AppError::from(AnalysisError::AnalysisFailed {
            operation: Operation::JobMatch,
            reason: "expected value at line 1".to_string(),
        });
        assert!(resume.public_parts().2.contains("analyzing the resume"));
        assert!(job.public_parts().2.contains("analyzing the job match"));
    }

    #[test]
    fn test_payload_too_large_reports_limit_in_mb() {
        let (status, _, message) = AppError::PayloadTooLarge {
            limit: 10 * 1024 * 1024,
        }
        .public_parts();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(message.contains("10 MB"));
    }
}
