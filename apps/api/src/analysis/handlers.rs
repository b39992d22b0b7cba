use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::analysis::analyzer::AnalysisError;
use crate::analysis::models::{JobMatchResult, ResumeAnalysisResult};
use crate::errors::AppError;
use crate::extraction::{extract_in_background, DocumentKind, ExtractedText, UploadedDocument};
use crate::llm_client::retry::{RetryHooks, RetryNotice};
use crate::state::AppState;

/// Multipart field carrying the resume file.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub text: String,
    pub text_file_name: String,
    pub format: DocumentKind,
    pub characters: usize,
}

impl From<ExtractedText> for ExtractResponse {
    fn from(extracted: ExtractedText) -> Self {
        let text_file_name = extracted.text_file_name();
        let format = extracted.kind();
        let text = extracted.as_str().to_string();
        Self {
            characters: text.chars().count(),
            text,
            text_file_name,
            format,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeUploadResponse {
    pub extraction: ExtractResponse,
    pub analysis: ResumeAnalysisResult,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub resume_text: String,
    pub job_description: String,
}

/// POST /api/v1/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let document = read_upload(multipart, state.config.max_upload_bytes).await?;
    let extracted = extract_in_background(document).await?;
    Ok(Json(extracted.into()))
}

/// POST /api/v1/analyze
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeUploadResponse>, AppError> {
    let document = read_upload(multipart, state.config.max_upload_bytes).await?;
    let extracted = extract_in_background(document).await?;
    let analysis = state
        .analyzer
        .analyze(extracted.as_str(), &RetryHooks::default())
        .await?;

    Ok(Json(AnalyzeUploadResponse {
        extraction: extracted.into(),
        analysis,
    }))
}

/// POST /api/v1/analyze/text
pub async fn handle_analyze_text(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeTextRequest>,
) -> Result<Json<ResumeAnalysisResult>, AppError> {
    require_text("text", &req.text)?;
    let analysis = state
        .analyzer
        .analyze(&req.text, &RetryHooks::default())
        .await?;
    Ok(Json(analysis))
}

/// POST /api/v1/analyze/stream
///
/// Emits one `retry` event per rate-limit backoff, then a single `result` or
/// `error` event. Dropping the connection cancels the pending analysis.
pub async fn handle_analyze_stream(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeTextRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_text("text", &req.text)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<RetryNotice>();
    let cancel = CancellationToken::new();
    let hooks = RetryHooks::default()
        .with_cancel(cancel.clone())
        .with_observer(Arc::new(move |notice| {
            let _ = tx.send(notice);
        }));

    let analyzer = state.analyzer.clone();
    let text = req.text;
    let mut task = tokio::spawn(async move { analyzer.analyze(&text, &hooks).await });
    let guard = cancel.drop_guard();

    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            tokio::select! {
                biased;
                Some(notice) = rx.recv() => {
                    yield Ok::<_, Infallible>(retry_event(&notice));
                }
                outcome = &mut task => {
                    // Notices sent just before completion still go out first.
                    while let Ok(notice) = rx.try_recv() {
                        yield Ok(retry_event(&notice));
                    }
                    yield Ok(outcome_event(outcome));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<JobMatchResult>, AppError> {
    require_text("resumeText", &req.resume_text)?;
    require_text("jobDescription", &req.job_description)?;

    let result = state
        .analyzer
        .match_job(&req.resume_text, &req.job_description, &RetryHooks::default())
        .await?;
    Ok(Json(result))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Pulls the `file` field out of a multipart body, enforcing the size ceiling.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<UploadedDocument, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("resume").to_string();
        let media_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        if bytes.len() > max_bytes {
            return Err(AppError::PayloadTooLarge { limit: max_bytes });
        }

        info!(
            "Received upload {file_name} ({} bytes, {})",
            bytes.len(),
            media_type.as_deref().unwrap_or("no content type")
        );
        return Ok(UploadedDocument::new(bytes, media_type, file_name));
    }

    Err(AppError::Validation(format!(
        "multipart field '{FILE_FIELD}' is required"
    )))
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit: max_bytes }
    } else {
        AppError::Validation(e.body_text())
    }
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn retry_event(notice: &RetryNotice) -> Event {
    debug!(
        "Streaming retry notice: attempt={}, delay_ms={}",
        notice.attempt,
        notice.delay.as_millis()
    );
    Event::default()
        .event("retry")
        .data(serde_json::to_string(notice).unwrap_or_default())
}

fn outcome_event(
    outcome: Result<Result<ResumeAnalysisResult, AnalysisError>, JoinError>,
) -> Event {
    let failure = match outcome {
        Ok(Ok(analysis)) => {
            return Event::default()
                .event("result")
                .data(serde_json::to_string(&analysis).unwrap_or_default());
        }
        Ok(Err(e)) => AppError::from(e),
        Err(e) => AppError::Internal(anyhow::anyhow!("analysis task failed: {e}")),
    };

    let (_, body) = failure.body();
    Event::default()
        .event("error")
        .data(serde_json::to_string(&body).unwrap_or_default())
}
