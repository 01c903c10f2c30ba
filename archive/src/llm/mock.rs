//! Scripted LLM for tests: queued replies, queued logprobs, call recording.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ChatMessage, ChatOptions, ChatOutput, CompleteOptions, CompleteOutput, LlmClient, LlmError,
};

/// Replays queued responses in order; when the queue is empty, returns the
/// fallback reply. Records every chat call so tests can assert on prompts and
/// temperatures.
#[derive(Default)]
pub struct MockLlm {
    replies: Mutex<VecDeque<String>>,
    logprobs: Mutex<VecDeque<Vec<f64>>>,
    fallback: String,
    pub calls: Mutex<Vec<RecordedCall>>,
}

/// One recorded chat call: the messages sent and the sampling temperature.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            fallback: "mock reply".to_string(),
            ..Self::default()
        }
    }

    /// Reply returned once every queued reply has been consumed.
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = reply.into();
        self
    }

    /// Queue the next chat/completion reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }

    /// Queue the next logprobs vector (consumed by echo-mode completions).
    pub fn push_logprobs(&self, lp: Vec<f64>) {
        self.logprobs.lock().unwrap().push_back(lp);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_reply(&self) -> String {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        opts: &ChatOptions,
    ) -> Result<ChatOutput, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            temperature: opts.temperature,
        });
        Ok(ChatOutput {
            text: self.next_reply(),
            usage: None,
        })
    }

    async fn complete(
        &self,
        prompt: &str,
        opts: &CompleteOptions,
    ) -> Result<CompleteOutput, LlmError> {
        let logprobs = if opts.logprobs.is_some() {
            // Scripted logprobs, else a flat -1.0 per whitespace token.
            Some(self.logprobs.lock().unwrap().pop_front().unwrap_or_else(|| {
                prompt.split_whitespace().map(|_| -1.0).collect()
            }))
        } else {
            None
        };
        Ok(CompleteOutput {
            text: if opts.echo {
                prompt.to_string()
            } else {
                self.next_reply()
            },
            logprobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_are_consumed_in_order_then_fallback() {
        let llm = MockLlm::new().with_fallback("done");
        llm.push_reply("first");
        llm.push_reply("second");
        let opts = ChatOptions::default();
        assert_eq!(llm.chat(&[], &opts).await.unwrap().text, "first");
        assert_eq!(llm.chat(&[], &opts).await.unwrap().text, "second");
        assert_eq!(llm.chat(&[], &opts).await.unwrap().text, "done");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn unscripted_logprobs_default_to_one_per_token() {
        let llm = MockLlm::new();
        let lp = llm.logprobs("three word prompt").await.unwrap();
        assert_eq!(lp.len(), 3);
    }

    #[tokio::test]
    async fn temperature_is_recorded() {
        let llm = MockLlm::new();
        let _ = llm
            .chat(&[ChatMessage::user("q")], &ChatOptions::with_temperature(0.3))
            .await;
        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls[0].temperature, Some(0.3));
    }
}
