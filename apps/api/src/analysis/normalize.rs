//! Response normalizer: turns raw model output into an `AnalysisReport`.
//!
//! Three mutually exclusive rungs, tried in order:
//! 1. `Direct`: the whole output is a JSON object.
//! 2. `Extracted`: the slice from the first `{` to the last `}` is a JSON object.
//! 3. `Default`: the safe default report. Never fails.
//!
//! Whatever rung 1 or 2 yields goes through `normalize_fields`, the single place
//! where types are coerced and scores clamped. Parse failures never leave this module.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const PARSE_FAILURE_SUMMARY: &str = "Analysis failed: could not parse model output.";

const MIN_SCORE: i64 = 0;
const MAX_SCORE: i64 = 100;

/// Structured comparison of a resume against a job description.
///
/// Every field is always present and typed; scores are always within 0..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub ats_score: u8,
    pub match_score: u8,
    pub skill_match: Vec<String>,
    pub skill_mismatch: Vec<String>,
    pub summary: String,
    pub rewritten_resume: String,
}

impl AnalysisReport {
    /// The terminal fallback used when nothing structured can be recovered.
    pub fn safe_default(original_resume: &str) -> Self {
        AnalysisReport {
            ats_score: 0,
            match_score: 0,
            skill_match: Vec::new(),
            skill_mismatch: Vec::new(),
            summary: PARSE_FAILURE_SUMMARY.to_string(),
            rewritten_resume: original_resume.to_string(),
        }
    }
}

/// Which rung of the ladder produced the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Direct,
    Extracted,
    Default,
}

/// Result of walking the parse ladder, before field normalization.
#[derive(Debug, PartialEq)]
pub enum ParseOutcome {
    Direct(Map<String, Value>),
    Extracted(Map<String, Value>),
    Default,
}

impl ParseOutcome {
    pub fn stage(&self) -> ParseStage {
        match self {
            ParseOutcome::Direct(_) => ParseStage::Direct,
            ParseOutcome::Extracted(_) => ParseStage::Extracted,
            ParseOutcome::Default => ParseStage::Default,
        }
    }
}

/// Normalizes raw model output. Total: returns a valid report for every input,
/// along with the rung that produced it.
pub fn normalize_with_stage(raw: &str, original_resume: &str) -> (AnalysisReport, ParseStage) {
    let outcome = parse_model_output(raw);
    let stage = outcome.stage();

    let report = match outcome {
        ParseOutcome::Direct(fields) | ParseOutcome::Extracted(fields) => {
            normalize_fields(&fields, original_resume)
        }
        ParseOutcome::Default => AnalysisReport::safe_default(original_resume),
    };

    (report, stage)
}

/// Walks the ladder. A value that parses but is not an object fails its rung.
pub fn parse_model_output(raw: &str) -> ParseOutcome {
    match parse_object(raw) {
        Ok(fields) => return ParseOutcome::Direct(fields),
        Err(reason) => debug!("Direct parse failed: {reason}"),
    }

    let Some(candidate) = outermost_braces(raw) else {
        warn!("Model output contains no JSON object; using safe defaults");
        return ParseOutcome::Default;
    };

    match parse_object(candidate) {
        Ok(fields) => {
            warn!("Recovered JSON object embedded in model commentary");
            ParseOutcome::Extracted(fields)
        }
        Err(reason) => {
            warn!("Embedded JSON could not be parsed ({reason}); using safe defaults");
            ParseOutcome::Default
        }
    }
}

enum ParseFailure {
    InvalidJson(serde_json::Error),
    NotAnObject(&'static str),
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::InvalidJson(e) => write!(f, "invalid JSON: {e}"),
            ParseFailure::NotAnObject(kind) => write!(f, "expected an object, got {kind}"),
        }
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ParseFailure> {
    match serde_json::from_str::<Value>(text).map_err(ParseFailure::InvalidJson)? {
        Value::Object(fields) => Ok(fields),
        Value::Array(_) => Err(ParseFailure::NotAnObject("an array")),
        Value::String(_) => Err(ParseFailure::NotAnObject("a string")),
        Value::Number(_) => Err(ParseFailure::NotAnObject("a number")),
        Value::Bool(_) => Err(ParseFailure::NotAnObject("a boolean")),
        Value::Null => Err(ParseFailure::NotAnObject("null")),
    }
}

/// Slice from the first `{` through the last `}`, if the last comes after the first.
fn outermost_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Coerces a parsed object into the report schema.
///
/// Score policy is per field: a score that cannot be read as a number becomes 0
/// and the rest of the report is kept.
pub fn normalize_fields(fields: &Map<String, Value>, original_resume: &str) -> AnalysisReport {
    AnalysisReport {
        ats_score: coerce_score(fields.get("ats_score")),
        match_score: coerce_score(fields.get("match_score")),
        skill_match: coerce_list(fields.get("skill_match")),
        skill_mismatch: coerce_list(fields.get("skill_mismatch")),
        summary: coerce_string(fields.get("summary")).unwrap_or_default(),
        rewritten_resume: coerce_string(fields.get("rewritten_resume"))
            .unwrap_or_else(|| original_resume.to_string()),
    }
}

fn coerce_score(value: Option<&Value>) -> u8 {
    let score = value.and_then(score_as_i64).unwrap_or(MIN_SCORE);
    // Clamped into 0..=100, so the narrowing cast is lossless.
    score.clamp(MIN_SCORE, MAX_SCORE) as u8
}

fn score_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().and_then(float_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Truncates toward zero; `as` saturates at the i64 bounds.
fn float_to_i64(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.trunc() as i64)
}

fn coerce_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
        Some(scalar) => vec![value_to_string(scalar)],
    }
}

/// `None` when the field is absent or null, so callers choose the default.
fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_to_string(v)),
    }
}

/// Strings verbatim, everything else as its JSON text.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
