// Resume analysis: prompt building, the model call with bounded retries,
// and normalization of whatever the model sends back.
// All LLM calls go through llm_client, never straight to the provider.

pub mod handlers;
pub mod normalize;
pub mod prompts;
pub mod service;
