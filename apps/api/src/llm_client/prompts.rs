// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Output rules appended to every prompt that expects a JSON object back.
pub const JSON_ONLY_RULES: &str = "\
Rules:
- Respond with the JSON object ONLY.
- Do NOT add any explanation, commentary, or text outside the JSON.
- Do NOT include markdown or code fences.
- Do NOT include trailing commas.";

/// Output rule for prompts that expect plain prose back.
pub const PLAIN_TEXT_ONLY: &str =
    "Return only the requested text, with no preamble and no extra commentary.";
