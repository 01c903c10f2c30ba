//! Agents over the shared ReAct loop: basic, advanced, recursive, plus the
//! research and code specializations that trade the loop for fixed pipelines.

mod code;
mod parse;
pub mod prompts;
mod react;
mod research;

pub use code::{CodeAgent, CodeAssist, DEFAULT_MAX_ATTEMPTS};
pub use parse::{parse_step, ParseError, ParsedAction, ParsedStep};
pub use react::{
    AgentError, AgentRun, AgentStep, ReactAgent, DEFAULT_MAX_STEPS, HARD_STEP_CAP,
};
pub use research::{MultiResearchReport, ResearchAgent, ResearchReport, ResearchSource};
