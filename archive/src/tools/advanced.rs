//! Advanced tool set: memory search, sandboxed code execution, datetime,
//! JSON utilities, and the web-search placeholder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, Utc};

use super::validate::{validate_code, MAX_CODE_LEN};
use super::Tool;
use crate::memory::MemoryStore;
use crate::sandbox::SandboxClient;

const MAX_SEARCH_INPUT: usize = 500;

/// Semantic search over stored memories, formatted for the agent.
pub struct MemorySearchTool {
    store: Arc<dyn MemoryStore>,
    top_k: usize,
}

impl MemorySearchTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store, top_k: 3 }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "MemorySearch"
    }

    fn description(&self) -> &str {
        "Search long-term memory for past statements relevant to a query"
    }

    async fn invoke(&self, input: &str) -> String {
        let query = input.trim();
        if query.is_empty() {
            return "Error: search query is empty".to_string();
        }
        if query.len() > MAX_SEARCH_INPUT {
            return format!(
                "Error: query is {} chars, limit is {MAX_SEARCH_INPUT}",
                query.len()
            );
        }
        match self.store.search(query, self.top_k, None).await {
            Ok(hits) if hits.is_empty() => "No relevant memories found.".to_string(),
            Ok(hits) => hits
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    format!(
                        "{}. (similarity {:.2}) {}",
                        i + 1,
                        h.similarity,
                        h.entry.message
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("Error: memory search failed: {e}"),
        }
    }
}

/// Validated execution in the external sandbox. Blocking validation problems
/// never reach the sandbox; warnings ride along on top of the output.
pub struct CodeExecutionTool {
    sandbox: Arc<SandboxClient>,
}

impl CodeExecutionTool {
    pub fn new(sandbox: Arc<SandboxClient>) -> Self {
        Self { sandbox }
    }
}

/// Strips the code fence the model usually wraps source in.
pub(crate) fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop a language tag on the opening fence line.
    match inner.split_once('\n') {
        Some((first, rest)) if first.len() <= 12 && !first.contains(' ') => rest.trim(),
        _ => inner.trim(),
    }
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn name(&self) -> &str {
        "CodeExecution"
    }

    fn description(&self) -> &str {
        "Run a short Python snippet in the sandbox (allowed imports: math, json, random, datetime, itertools, functools, re, string, hashlib)"
    }

    async fn invoke(&self, input: &str) -> String {
        if input.len() > MAX_CODE_LEN + 64 {
            return format!("Validation Error: code is {} chars, limit is {MAX_CODE_LEN}", input.len());
        }
        let code = strip_code_fence(input);
        let warnings = match validate_code(code) {
            Ok(w) => w,
            Err(e) => return e,
        };
        let outcome = match self.sandbox.execute(code, None).await {
            Ok(o) => o,
            Err(e) => return format!("Error: {e}"),
        };
        let body = if outcome.is_success() {
            outcome.output().to_string()
        } else {
            format!("Error: sandbox execution failed: {}", outcome.output())
        };
        if warnings.is_empty() {
            body
        } else {
            format!("{}\n{}", warnings.join("\n"), body)
        }
    }
}

/// Current date/time in one of five fixed modes; any other mode is an error.
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "DateTime"
    }

    fn description(&self) -> &str {
        "Current date/time; modes: now, date, time, timestamp, iso"
    }

    async fn invoke(&self, input: &str) -> String {
        let mode = input.trim().to_lowercase();
        let mode = if mode.is_empty() { "now".to_string() } else { mode };
        let local = Local::now();
        match mode.as_str() {
            "now" => local.format("%Y-%m-%d %H:%M:%S").to_string(),
            "date" => local.format("%Y-%m-%d").to_string(),
            "time" => local.format("%H:%M:%S").to_string(),
            "timestamp" => Utc::now().timestamp().to_string(),
            "iso" => Utc::now().to_rfc3339(),
            other => format!("Error: unknown mode '{other}' (use now, date, time, timestamp, iso)"),
        }
    }
}

/// Parse / validate / pretty-print JSON, tolerating the quoting and fencing
/// the model tends to add.
pub struct JsonTool;

fn strip_llm_wrapping(input: &str) -> &str {
    let s = strip_code_fence(input);
    let s = s.trim();
    // One layer of symmetric wrapping quotes around a JSON body.
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        let (first, last) = (bytes[0], bytes[s.len() - 1]);
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            let inner = s[1..s.len() - 1].trim();
            if inner.starts_with('{') || inner.starts_with('[') {
                return inner;
            }
        }
    }
    s
}

#[async_trait]
impl Tool for JsonTool {
    fn name(&self) -> &str {
        "JSON"
    }

    fn description(&self) -> &str {
        "Validate and pretty-print a JSON document"
    }

    async fn invoke(&self, input: &str) -> String {
        let cleaned = strip_llm_wrapping(input);
        if cleaned.is_empty() {
            return "Error: input is empty".to_string();
        }
        match serde_json::from_str::<serde_json::Value>(cleaned) {
            Ok(v) => serde_json::to_string_pretty(&v)
                .unwrap_or_else(|e| format!("Error: could not re-serialize: {e}")),
            Err(e) => format!("Error: invalid JSON: {e}"),
        }
    }
}

/// Placeholder: this deployment has no search provider wired in.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "WebSearch"
    }

    fn description(&self) -> &str {
        "Web search (not available in this deployment)"
    }

    async fn invoke(&self, _input: &str) -> String {
        "Web search is not implemented in this deployment; answer from memory and reasoning instead."
            .to_string()
    }
}
