//! Scripted `ChatModel` for tests: replays queued replies and records every call.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatModel, LlmError};
use crate::config::CompletionProfile;

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, CompletionProfile)>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self::with_replies(vec![Ok(text.to_string())])
    }

    pub fn with_replies(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<(String, CompletionProfile)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        prompt: &str,
        profile: &CompletionProfile,
    ) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), profile.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}
