//! # Archive orchestrator core
//!
//! The central piece of a local-first cognitive stack: routes chat and agent
//! requests across a fast and an optional deep OpenAI-compatible engine,
//! captures every user turn to a durable stream, retains the surprising ones
//! in a vector memory, and runs the agent workflows on top.
//!
//! ## Main modules
//!
//! - [`llm`]: [`LlmClient`] over the engines ([`HttpLlm`], [`MockLlm`]),
//!   fast/deep routing ([`Engines`]).
//! - [`memory`]: surprise-gated vector memory ([`MemoryStore`],
//!   [`RedisMemoryStore`], [`InMemoryMemoryStore`]) with an injected
//!   [`Embedder`].
//! - [`stream`]: the durable input stream the worker consumes.
//! - [`worker`]: the [`MemoryWorker`] scoring loop (perplexity + novelty).
//! - [`tools`]: the [`Tool`] registry the agents act with, including the
//!   pre-sandbox code validator.
//! - [`agent`]: the bounded ReAct loop ([`ReactAgent`]), its tolerant output
//!   parser, and the research/code specializations.
//! - [`verify`]: the four-step chain-of-verification.
//! - [`router`] / [`persona`]: `/chat` intent routing and persona injection.
//! - [`archival`] / [`metrics`] / [`health`]: lifecycle workers.
//! - [`settings`]: typed configuration from the environment.
//!
//! One long-lived instance of each shared handle ([`Engines`], the stores,
//! the workers) is constructed at startup from immutable [`Settings`] and
//! torn down through a shared cancellation token.

pub mod agent;
pub mod archival;
pub mod health;
pub mod library;
pub mod llm;
pub mod memory;
pub mod metrics;
pub mod persona;
pub mod router;
pub mod sandbox;
pub mod settings;
pub mod stream;
pub mod tools;
pub mod verify;
pub mod worker;

pub use agent::{AgentRun, AgentStep, ReactAgent};
pub use llm::{Engines, HttpLlm, LlmClient, MockLlm};
pub use memory::{Embedder, InMemoryMemoryStore, MemoryEntry, MemoryStore, RedisMemoryStore};
pub use settings::Settings;
pub use stream::{InMemoryInputStream, InputStream, RedisInputStream};
pub use tools::{Tool, ToolRegistry};
pub use worker::{MemoryWorker, WorkerStats};
