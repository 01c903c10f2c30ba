//! The ReAct loop: think, act, observe, bounded.
//!
//! Each iteration sends the system prompt, the tool summary, and the running
//! trace to the LLM, parses one thought/action/input group, and either
//! finishes (`Final Answer`) or invokes a tool and records the observation.
//! Tool failures become observations, never errors; the loop only fails when
//! the LLM itself is unreachable.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::parse::{parse_step, ParsedAction};
use super::prompts::REACT_FORMAT;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, LlmError};
use crate::tools::ToolRegistry;

/// Default and ceiling for the iteration budget.
pub const DEFAULT_MAX_STEPS: usize = 10;
pub const HARD_STEP_CAP: usize = 50;

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// One recorded loop iteration, returned in API responses.
#[derive(Clone, Debug, serde::Serialize)]
pub struct AgentStep {
    pub step_number: usize,
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
    #[serde(skip)]
    pub tool_ok: bool,
}

/// Outcome of one agent run. `success` is true iff the final step's action
/// was `Final Answer`.
#[derive(Clone, Debug)]
pub struct AgentRun {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub struct ReactAgent {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    system_prompt: String,
    max_steps: usize,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

impl ReactAgent {
    pub fn new(llm: Arc<dyn LlmClient>, registry: ToolRegistry, system_prompt: &str) -> Self {
        Self {
            llm,
            registry,
            system_prompt: system_prompt.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Iteration budget, clamped to the hard cap.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.clamp(1, HARD_STEP_CAP);
        self
    }

    pub fn with_timeouts(mut self, llm: Duration, tool: Duration) -> Self {
        self.llm_timeout = llm;
        self.tool_timeout = tool;
        self
    }

    fn build_messages(&self, question: &str, steps: &[AgentStep]) -> Vec<ChatMessage> {
        let system = format!(
            "{}\n\nAvailable tools:\n{}\n\n{}",
            self.system_prompt,
            self.registry.summary(),
            REACT_FORMAT
        );

        let mut trace = format!("Question: {question}\n");
        for step in steps {
            trace.push_str(&format!(
                "\nThought: {}\nAction: {}\nAction Input: {}\nObservation: {}\n",
                step.thought, step.action, step.action_input, step.observation
            ));
        }
        if !steps.is_empty() {
            trace.push_str("\nContinue from the observations above.");
        }

        vec![ChatMessage::system(system), ChatMessage::user(trace)]
    }

    async fn call_llm(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let opts = ChatOptions::default();
        let fut = self.llm.chat(messages, &opts);
        match tokio::time::timeout(self.llm_timeout, fut).await {
            Ok(out) => Ok(out?.text),
            Err(_) => Err(AgentError::Llm(LlmError::Unavailable(format!(
                "llm call exceeded {}s",
                self.llm_timeout.as_secs()
            )))),
        }
    }

    async fn invoke_tool(&self, name: &str, input: &str) -> String {
        let Some(tool) = self.registry.get(name) else {
            return format!(
                "Error: unknown tool '{name}'; available tools: {}",
                self.registry.names().join(", ")
            );
        };
        match tokio::time::timeout(self.tool_timeout, tool.invoke(input)).await {
            Ok(obs) => obs,
            Err(_) => format!(
                "Error: tool '{name}' exceeded {}s",
                self.tool_timeout.as_secs()
            ),
        }
    }

    /// Runs the loop to a final answer or the iteration budget.
    pub async fn run(&self, question: &str) -> Result<AgentRun, AgentError> {
        let mut steps: Vec<AgentStep> = Vec::new();

        for iteration in 1..=self.max_steps {
            let messages = self.build_messages(question, &steps);
            let output = self.call_llm(&messages).await?;

            let parsed = match parse_step(&output) {
                Ok(p) => p,
                Err(e) => {
                    // Unparseable turn: feed the failure back as an observation
                    // and let the model try again.
                    steps.push(AgentStep {
                        step_number: iteration,
                        thought: output.trim().to_string(),
                        action: "none".to_string(),
                        action_input: String::new(),
                        observation: format!(
                            "Error: could not parse your response ({e}); {REACT_FORMAT}"
                        ),
                        tool_ok: false,
                    });
                    continue;
                }
            };

            match parsed.action {
                ParsedAction::FinalAnswer => {
                    let answer = parsed.input.clone();
                    steps.push(AgentStep {
                        step_number: iteration,
                        thought: parsed.thought,
                        action: "Final Answer".to_string(),
                        action_input: parsed.input,
                        observation: "final answer given".to_string(),
                        tool_ok: true,
                    });
                    return Ok(AgentRun {
                        answer,
                        steps,
                        success: true,
                    });
                }
                ParsedAction::Tool(name) => {
                    let observation = self.invoke_tool(&name, &parsed.input).await;
                    let tool_ok = !observation.starts_with("Error:")
                        && !observation.starts_with("Validation Error:");
                    tracing::debug!(tool = %name, tool_ok, "agent tool invocation");
                    steps.push(AgentStep {
                        step_number: iteration,
                        thought: parsed.thought,
                        action: name,
                        action_input: parsed.input,
                        observation,
                        tool_ok,
                    });
                }
            }
        }

        // Budget exhausted: synthesize from what was observed.
        Ok(AgentRun {
            answer: synthesize_fallback(&steps),
            steps,
            success: false,
        })
    }
}

/// Best-effort answer when the loop hits its budget: the last useful
/// observation, or an explanation that nothing useful was observed.
fn synthesize_fallback(steps: &[AgentStep]) -> String {
    let last_useful = steps
        .iter()
        .rev()
        .find(|s| s.tool_ok && !s.observation.is_empty());
    match last_useful {
        Some(s) => format!(
            "Reached the step limit before a final answer. Last result from {}: {}",
            s.action, s.observation
        ),
        None => "Reached the step limit without producing a useful result.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn agent(llm: Arc<MockLlm>, max_steps: usize) -> ReactAgent {
        ReactAgent::new(llm, ToolRegistry::basic(), "test agent").with_max_steps(max_steps)
    }

    /// Scenario: calculator then final answer, two iterations, success.
    #[tokio::test]
    async fn tool_then_final_answer_succeeds() {
        let llm = Arc::new(MockLlm::new());
        llm.push_reply("Thought: multiply first\nAction: Calculator\nAction Input: 15 * 23");
        llm.push_reply("Thought: done\nAction: Final Answer\nAction Input: The product is 345.");
        let run = agent(Arc::clone(&llm), 10).run("what is 15 times 23").await.unwrap();

        assert!(run.success);
        assert_eq!(run.answer, "The product is 345.");
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].action, "Calculator");
        assert_eq!(run.steps[0].observation, "345");
        assert!(run.steps[0].tool_ok);
        assert_eq!(run.steps[1].action, "Final Answer");
    }

    /// Termination: the loop never exceeds max_steps LLM calls and reports
    /// success = false when the budget runs out.
    #[tokio::test]
    async fn loop_terminates_at_budget_without_final_answer() {
        let llm = Arc::new(
            MockLlm::new()
                .with_fallback("Thought: again\nAction: Calculator\nAction Input: 1 + 1"),
        );
        let run = agent(Arc::clone(&llm), 3).run("loop forever").await.unwrap();

        assert!(!run.success);
        assert_eq!(run.steps.len(), 3);
        assert_eq!(llm.call_count(), 3);
        assert!(run.answer.contains("step limit"));
        assert!(run.answer.contains('2'));
    }

    /// Parser purity: unparseable output becomes an error observation and the
    /// loop continues to the next iteration.
    #[tokio::test]
    async fn unparseable_output_is_an_observation_not_a_failure() {
        let llm = Arc::new(MockLlm::new());
        llm.push_reply("I will just chat instead of following the format.");
        llm.push_reply("Thought: ok\nAction: Final Answer\nAction Input: recovered");
        let run = agent(Arc::clone(&llm), 10).run("q").await.unwrap();

        assert!(run.success);
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].action, "none");
        assert!(run.steps[0].observation.starts_with("Error:"));
        assert_eq!(run.answer, "recovered");
    }

    #[tokio::test]
    async fn unknown_tool_becomes_tool_error_observation() {
        let llm = Arc::new(MockLlm::new());
        llm.push_reply("Thought: t\nAction: Teleport\nAction Input: home");
        llm.push_reply("Thought: ok\nAction: Final Answer\nAction Input: fine");
        let run = agent(Arc::clone(&llm), 10).run("q").await.unwrap();

        assert!(!run.steps[0].tool_ok);
        assert!(run.steps[0].observation.contains("unknown tool"));
        assert!(run.steps[0].observation.contains("Calculator"));
        assert!(run.success);
    }

    #[tokio::test]
    async fn mixed_case_tool_names_resolve() {
        let llm = Arc::new(MockLlm::new());
        llm.push_reply("Thought: t\nAction: cAlCuLaToR\nAction Input: 2 ** 5");
        llm.push_reply("Thought: done\nAction: Final Answer\nAction Input: 32");
        let run = agent(Arc::clone(&llm), 10).run("q").await.unwrap();
        assert_eq!(run.steps[0].observation, "32");
        assert!(run.steps[0].tool_ok);
    }

    #[tokio::test]
    async fn max_steps_is_clamped_to_hard_cap() {
        let llm = Arc::new(MockLlm::new());
        let a = agent(llm, 10_000);
        assert_eq!(a.max_steps, HARD_STEP_CAP);
    }

    #[tokio::test]
    async fn trace_carries_prior_observations_to_the_next_prompt() {
        let llm = Arc::new(MockLlm::new());
        llm.push_reply("Thought: t\nAction: Calculator\nAction Input: 6 × 7");
        llm.push_reply("Thought: done\nAction: Final Answer\nAction Input: 42");
        let _ = agent(Arc::clone(&llm), 10).run("q").await.unwrap();

        let calls = llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let second_user = &calls[1].messages[1].content;
        assert!(second_user.contains("Observation: 42"));
        assert!(second_user.contains("Action: Calculator"));
    }
}
