//! Recursive-LM tool: code execution over a corpus variable with a nested
//! LLM callback.
//!
//! User code sees `CORPUS` (the full corpus as a string) and `ask_llm(prompt)`.
//! The sandbox never calls back into the host: literal `ask_llm("...")` call
//! sites are resolved here first, each becoming a nested chat completion,
//! and their answers are injected through the sandbox context as
//! `__LLM_ANSWERS`, with the call sites rewritten to index into it. Dynamic
//! prompts fall through to an injected stub so the code still runs. A
//! per-request counter bounds nesting.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::advanced::strip_code_fence;
use super::validate::validate_code;
use super::Tool;
use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::sandbox::SandboxClient;

/// Default cap on nested `ask_llm` completions per request.
pub const ASK_LLM_CAP: u32 = 50;

static ASK_LLM_LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"ask_llm\(\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')\s*\)"#).unwrap()
});

/// Fallback for `ask_llm` prompts computed at runtime; prepended to the
/// submitted code and shadowed by nothing (call sites with literal prompts
/// are rewritten away before this is ever reached).
const ASK_LLM_STUB: &str = "def ask_llm(prompt):\n    return \"[ask_llm: only literal string prompts are resolved in this sandbox]\"\n";

pub struct RecursiveLmTool {
    llm: Arc<dyn LlmClient>,
    sandbox: Arc<SandboxClient>,
    corpus: String,
    asked: AtomicU32,
    cap: u32,
}

impl RecursiveLmTool {
    pub fn new(llm: Arc<dyn LlmClient>, sandbox: Arc<SandboxClient>, corpus: String) -> Self {
        Self {
            llm,
            sandbox,
            corpus,
            asked: AtomicU32::new(0),
            cap: ASK_LLM_CAP,
        }
    }

    pub fn with_cap(mut self, cap: u32) -> Self {
        self.cap = cap;
        self
    }

    /// Nested completion for one resolved call site, bounded by the counter.
    async fn ask(&self, prompt: &str) -> String {
        if self.asked.fetch_add(1, Ordering::Relaxed) >= self.cap {
            return format!("[ask_llm: call limit of {} reached]", self.cap);
        }
        let messages = [ChatMessage::user(prompt)];
        match self.llm.chat(&messages, &ChatOptions::default()).await {
            Ok(out) => out.text,
            Err(e) => format!("[ask_llm failed: {e}]"),
        }
    }

    /// Resolves literal call sites to answers and rewrites them into
    /// `__LLM_ANSWERS[i]` lookups. Returns the rewritten code and the answers.
    async fn resolve_calls(&self, code: &str) -> (String, Vec<String>) {
        let mut answers = Vec::new();
        let mut rewritten = String::with_capacity(code.len());
        let mut last_end = 0;
        for cap in ASK_LLM_LITERAL_RE.captures_iter(code) {
            let Some(whole) = cap.get(0) else { continue };
            let prompt = cap
                .get(1)
                .or_else(|| cap.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default()
                .replace("\\\"", "\"")
                .replace("\\'", "'");
            rewritten.push_str(&code[last_end..whole.start()]);
            rewritten.push_str(&format!("__LLM_ANSWERS[{}]", answers.len()));
            last_end = whole.end();
            answers.push(self.ask(&prompt).await);
        }
        rewritten.push_str(&code[last_end..]);
        (rewritten, answers)
    }
}

#[async_trait]
impl Tool for RecursiveLmTool {
    fn name(&self) -> &str {
        "RecursiveLM"
    }

    fn description(&self) -> &str {
        "Run Python over the CORPUS variable; call ask_llm(\"...\") with literal prompts for nested reasoning"
    }

    async fn invoke(&self, input: &str) -> String {
        let code = strip_code_fence(input);
        let warnings = match validate_code(code) {
            Ok(w) => w,
            Err(e) => return e,
        };

        let (rewritten, answers) = self.resolve_calls(code).await;
        let full_code = format!("{ASK_LLM_STUB}\n{rewritten}");
        let context = json!({
            "CORPUS": self.corpus,
            "__LLM_ANSWERS": answers,
        });

        let body = match self.sandbox.execute(&full_code, Some(&context)).await {
            Ok(o) if o.is_success() => o.output().to_string(),
            Ok(o) => format!("Error: sandbox execution failed: {}", o.output()),
            Err(e) => format!("Error: {e}"),
        };
        if warnings.is_empty() {
            body
        } else {
            format!("{}\n{}", warnings.join("\n"), body)
        }
    }
}
