//! Analysis pipeline: prompt → model → normalize, with bounded retries.
//!
//! Retries live here rather than in the client: only transient provider errors are
//! retried, up to `Config::llm_max_attempts`, with exponential backoff (1s, 2s, 4s...).
//! Prompts are side-effect free, so a repeated call is idempotent.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::normalize::{normalize_with_stage, AnalysisReport, ParseStage};
use crate::analysis::prompts::{
    build_analysis_prompt, build_improvement_prompt, build_rewrite_prompt,
};
use crate::config::{CompletionProfile, Config};
use crate::errors::AppError;
use crate::llm_client::{ChatModel, LlmError};

const BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Calls the model, retrying transient failures up to `max_attempts` total calls.
pub async fn complete_with_retry(
    model: &dyn ChatModel,
    prompt: &str,
    profile: &CompletionProfile,
    max_attempts: u32,
) -> Result<String, LlmError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match model.complete(prompt, profile).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = BASE_BACKOFF * (1u32 << (attempt - 1).min(6));
                warn!(
                    "LLM call attempt {}/{} failed ({}), retrying after {}ms...",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Runs the analysis request and always returns a schema-valid report
/// once the provider has answered with anything at all.
pub async fn analyze_resume(
    model: &dyn ChatModel,
    config: &Config,
    resume_text: &str,
    job_description: &str,
) -> Result<AnalysisReport, AppError> {
    let prompt = build_analysis_prompt(resume_text, job_description);
    let raw = complete_with_retry(model, &prompt, &config.analysis, config.llm_max_attempts).await?;

    debug!("Raw model output (analyze): {raw}");

    let (report, stage) = normalize_with_stage(&raw, resume_text);
    match stage {
        ParseStage::Default => warn!(
            "Model output unusable ({} chars); returned safe default report",
            raw.len()
        ),
        stage => info!(
            "Analysis parsed via {:?}: ats_score={}, match_score={}",
            stage, report.ats_score, report.match_score
        ),
    }

    Ok(report)
}

/// Free-form rewrite. An empty completion falls back to the original resume text.
pub async fn rewrite_resume(
    model: &dyn ChatModel,
    config: &Config,
    resume_text: &str,
    job_description: &str,
) -> Result<String, AppError> {
    let request_id = Uuid::new_v4();
    info!("Rewrite request {request_id}");

    let prompt = build_rewrite_prompt(resume_text, job_description, request_id);
    let raw = complete_with_retry(model, &prompt, &config.rewrite, config.llm_max_attempts).await?;

    let rewritten = raw.trim();
    if rewritten.is_empty() {
        warn!("Rewrite request {request_id} returned no text; echoing original resume");
        return Ok(resume_text.to_string());
    }

    Ok(rewritten.to_string())
}

/// Improvement suggestions as prose. An empty completion is a provider error.
pub async fn suggest_improvements(
    model: &dyn ChatModel,
    config: &Config,
    resume_text: &str,
    job_description: &str,
) -> Result<String, AppError> {
    let prompt = build_improvement_prompt(resume_text, job_description);
    let raw = complete_with_retry(model, &prompt, &config.improve, config.llm_max_attempts).await?;

    let suggestions = raw.trim();
    if suggestions.is_empty() {
        return Err(AppError::Llm(LlmError::EmptyContent));
    }

    Ok(suggestions.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::normalize::PARSE_FAILURE_SUMMARY;
    use crate::llm_client::stub::ScriptedModel;

    fn server_error() -> LlmError {
        LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_error() {
        let model = ScriptedModel::with_replies(vec![Err(server_error()), Ok("done".into())]);
        let profile = Config::default().analysis;

        let text = complete_with_retry(&model, "prompt", &profile, 3).await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_bounded() {
        let model = ScriptedModel::with_replies(vec![
            Err(server_error()),
            Err(server_error()),
            Err(server_error()),
            Ok("too late".into()),
        ]);
        let profile = Config::default().analysis;

        let err = complete_with_retry(&model, "prompt", &profile, 3).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
        assert_eq!(model.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_not_retried() {
        let model = ScriptedModel::with_replies(vec![
            Err(LlmError::Api {
                status: 401,
                message: "Invalid API Key".into(),
            }),
            Ok("unused".into()),
        ]);
        let profile = Config::default().analysis;

        let err = complete_with_retry(&model, "prompt", &profile, 3).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_uses_analysis_profile_and_normalizes() {
        let model = ScriptedModel::replying(
            r#"Here you go: {"ats_score": 140, "match_score": "77", "skill_match": "Rust"}"#,
        );
        let config = Config::default();

        let report = analyze_resume(&model, &config, "resume text", "jd text")
            .await
            .unwrap();
        assert_eq!(report.ats_score, 100);
        assert_eq!(report.match_score, 77);
        assert_eq!(report.skill_match, vec!["Rust"]);
        assert_eq!(report.rewritten_resume, "resume text");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("resume text"));
        assert_eq!(calls[0].1, config.analysis);
    }

    #[tokio::test]
    async fn test_analyze_garbage_output_is_not_an_error() {
        let model = ScriptedModel::replying("I'm sorry, I can't help with that.");
        let report = analyze_resume(&model, &Config::default(), "resume", "jd")
            .await
            .unwrap();
        assert_eq!(report.summary, PARSE_FAILURE_SUMMARY);
        assert_eq!(report.rewritten_resume, "resume");
    }

    #[tokio::test]
    async fn test_analyze_provider_failure_surfaces() {
        let config = Config {
            llm_max_attempts: 1,
            ..Config::default()
        };
        let model = ScriptedModel::with_replies(vec![Err(server_error())]);
        let result = analyze_resume(&model, &config, "resume", "jd").await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_rewrite_uses_rewrite_profile() {
        let model = ScriptedModel::replying("  Rewritten resume  \n");
        let config = Config::default();

        let text = rewrite_resume(&model, &config, "original", "jd").await.unwrap();
        assert_eq!(text, "Rewritten resume");
        assert_eq!(model.calls()[0].1, config.rewrite);
    }

    #[tokio::test]
    async fn test_empty_rewrite_echoes_original() {
        let model = ScriptedModel::replying("   ");
        let text = rewrite_resume(&model, &Config::default(), "original", "jd")
            .await
            .unwrap();
        assert_eq!(text, "original");
    }

    #[tokio::test]
    async fn test_improvements_use_improve_profile() {
        let model = ScriptedModel::replying("- Add Kubernetes\n- Quantify impact");
        let config = Config::default();

        let text = suggest_improvements(&model, &config, "resume", "jd")
            .await
            .unwrap();
        assert!(text.starts_with("- Add Kubernetes"));
        assert_eq!(model.calls()[0].1, config.improve);
    }

    #[tokio::test]
    async fn test_empty_improvements_is_an_error() {
        let model = ScriptedModel::replying("");
        let result = suggest_improvements(&model, &Config::default(), "resume", "jd").await;
        assert!(matches!(result, Err(AppError::Llm(LlmError::EmptyContent))));
    }
}
