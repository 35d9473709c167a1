//! Axum route handlers for the analysis endpoints.
//!
//! All three endpoints take the same multipart form (`file` + `job_description`).
//! Input validation runs before extraction or any provider call.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::analysis::normalize::AnalysisReport;
use crate::analysis::prompts::truncate_resume;
use crate::analysis::service::{analyze_resume, rewrite_resume, suggest_improvements};
use crate::errors::AppError;
use crate::extract::{extract_text, DocumentFormat};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// A validated upload: supported extension, non-empty body, non-empty job description.
#[derive(Debug)]
pub struct ResumeUpload {
    pub filename: String,
    pub content: Bytes,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub filename: String,
    pub resume_text: String,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub filename: String,
    pub rewritten_resume: String,
}

#[derive(Debug, Serialize)]
pub struct ImproveResponse {
    pub filename: String,
    pub suggestions: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let model = state.model()?;
    let resume_text = prepare_resume_text(&state, &upload, "analyze").await?;

    let report = analyze_resume(model, &state.config, &resume_text, &upload.job_description).await?;

    Ok(Json(AnalyzeResponse {
        filename: upload.filename,
        resume_text,
        report,
    }))
}

/// POST /rewrite
pub async fn handle_rewrite(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RewriteResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let model = state.model()?;
    let resume_text = prepare_resume_text(&state, &upload, "rewrite").await?;

    let rewritten_resume =
        rewrite_resume(model, &state.config, &resume_text, &upload.job_description).await?;

    Ok(Json(RewriteResponse {
        filename: upload.filename,
        rewritten_resume,
    }))
}

/// POST /improve
pub async fn handle_improve(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImproveResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let model = state.model()?;
    let resume_text = prepare_resume_text(&state, &upload, "improve").await?;

    let suggestions =
        suggest_improvements(model, &state.config, &resume_text, &upload.job_description).await?;

    Ok(Json(ImproveResponse {
        filename: upload.filename,
        suggestions,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Reads the multipart form and validates it. Unknown fields are ignored.
async fn read_upload(mut multipart: Multipart) -> Result<ResumeUpload, AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut job_description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(file_read_error)?;
                file = Some((filename, content));
            }
            "job_description" => {
                job_description = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    let job_description = job_description.unwrap_or_default();
    if job_description.trim().is_empty() {
        return Err(AppError::Validation("Job description is empty".to_string()));
    }

    let (filename, content) =
        file.ok_or_else(|| AppError::Validation("Resume file is missing".to_string()))?;
    DocumentFormat::from_filename(&filename)?;
    if content.is_empty() {
        return Err(AppError::Validation("Empty resume file".to_string()));
    }

    Ok(ResumeUpload {
        filename,
        content,
        job_description,
    })
}

/// Extracts and truncates the resume text for the prompt.
async fn prepare_resume_text(
    state: &AppState,
    upload: &ResumeUpload,
    endpoint: &str,
) -> Result<String, AppError> {
    let extracted = extract_text(&upload.filename, upload.content.clone()).await?;
    let resume_text = truncate_resume(&extracted, state.config.max_resume_chars).to_string();

    info!(
        "{}: file='{}' resume_chars={} (extracted {}) jd_chars={}",
        endpoint,
        upload.filename,
        resume_text.chars().count(),
        extracted.chars().count(),
        upload.job_description.chars().count()
    );

    Ok(resume_text)
}

fn multipart_error(err: MultipartError) -> AppError {
    classify_multipart_error(err, |msg| {
        AppError::Validation(format!("Malformed multipart form: {msg}"))
    })
}

fn file_read_error(err: MultipartError) -> AppError {
    classify_multipart_error(err, AppError::FileRead)
}

/// An oversized body is always the client's fault, whichever field tripped the limit.
fn classify_multipart_error(
    err: MultipartError,
    otherwise: impl FnOnce(String) -> AppError,
) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        otherwise(err.body_text())
    }
}
