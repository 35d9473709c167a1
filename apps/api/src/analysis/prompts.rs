// Prompt builders for the analysis endpoints.
// Inputs are interpolated in one `format!` pass, so braces or placeholder-looking
// text inside a resume are never re-expanded.

use uuid::Uuid;

use crate::llm_client::prompts::{JSON_ONLY_RULES, PLAIN_TEXT_ONLY};

/// JSON schema the analysis prompt asks for. Field names match `AnalysisReport`.
pub const ANALYSIS_SCHEMA: &str = r#"{
  "ats_score": <integer 0-100>,
  "match_score": <integer 0-100>,
  "skill_match": [<string>, ...],
  "skill_mismatch": [<string>, ...],
  "summary": "<2-3 sentence ATS-style summary>",
  "rewritten_resume": "<rewritten resume text>"
}"#;

/// Hard cut at `max_chars` characters. Keeps the prefix; never splits a code point.
pub fn truncate_resume(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}

pub fn build_analysis_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        "You are an ATS resume analyzer.

Analyze the candidate's resume against the job description and respond ONLY with a JSON object.

=== RESUME START ===
{resume_text}
=== RESUME END ===

=== JOB DESCRIPTION START ===
{job_description}
=== JOB DESCRIPTION END ===

The JSON object MUST have exactly these keys and types:

{ANALYSIS_SCHEMA}

- \"skill_match\" lists skills found in both the resume and the job description.
- \"skill_mismatch\" lists skills the job description requires that the resume lacks.

{JSON_ONLY_RULES}"
    )
}

/// `request_id` only tags the request for tracing and provider-side cache busting;
/// the instruction itself is identical for identical resume and job description.
pub fn build_rewrite_prompt(resume_text: &str, job_description: &str, request_id: Uuid) -> String {
    format!(
        "You are an ATS-friendly resume rewriting assistant.

REQUEST ID: {request_id}

Task:
Rewrite the candidate's resume so it matches the job description more closely.
Keep it professional, ATS-friendly, and focused on measurable impact.
Do not invent employers, titles, dates, or qualifications that the resume does not contain.

=== RESUME START ===
{resume_text}
=== RESUME END ===

=== JOB DESCRIPTION START ===
{job_description}
=== JOB DESCRIPTION END ===

Output:
Return only the rewritten resume text. {PLAIN_TEXT_ONLY}"
    )
}

pub fn build_improvement_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        "You are an ATS expert.

=== RESUME START ===
{resume_text}
=== RESUME END ===

=== JOB DESCRIPTION START ===
{job_description}
=== JOB DESCRIPTION END ===

Give clear, specific improvement suggestions for this resume against this job description:
- missing skills
- keyword fixes
- formatting advice

{PLAIN_TEXT_ONLY}"
    )
}
