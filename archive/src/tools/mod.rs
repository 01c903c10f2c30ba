//! Tool registry for the ReAct agents.
//!
//! Every tool is `{name, description, invoke(text) -> text}`. Input
//! validation is the tool's own contract: empty input, oversize input, or a
//! bad mode comes back as a descriptive `Error:` / `Validation Error:`
//! string, never a panic or a Rust error. The agent loop feeds those
//! strings back to the model as observations.

mod advanced;
mod basic;
mod recursive;
pub mod validate;

pub use advanced::{
    CodeExecutionTool, DateTimeTool, JsonTool, MemorySearchTool, WebSearchTool,
};
pub use basic::{
    CalculatorTool, ExtractNumbersTool, ReverseStringTool, StringLengthTool, ToUppercaseTool,
    WordCountTool,
};
pub use recursive::{RecursiveLmTool, ASK_LLM_CAP};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

/// A single capability the agent can act with.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical tool name as shown to the model, e.g. `Calculator`.
    fn name(&self) -> &str;

    /// One-line description for the registry summary in the agent prompt.
    fn description(&self) -> &str;

    /// Runs the tool. All failures are returned as strings starting with
    /// `Error:` or `Validation Error:`.
    async fn invoke(&self, input: &str) -> String;
}

/// Case-insensitive registry keyed by canonical tool name.
///
/// Variants (basic, advanced, recursive) differ only in which tools are
/// registered; there is no tool inheritance anywhere.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    // BTreeMap keeps the prompt summary in a stable order.
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_lowercase(), tool);
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Lookup tolerant of the model's casing.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.values().map(|t| t.name().to_string()).collect()
    }

    /// `- Name: description` lines for the agent system prompt.
    pub fn summary(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The six side-effect-free text/arithmetic tools.
    pub fn basic() -> Self {
        Self::new()
            .with(Arc::new(CalculatorTool))
            .with(Arc::new(StringLengthTool))
            .with(Arc::new(WordCountTool))
            .with(Arc::new(ReverseStringTool))
            .with(Arc::new(ToUppercaseTool))
            .with(Arc::new(ExtractNumbersTool))
    }
}
