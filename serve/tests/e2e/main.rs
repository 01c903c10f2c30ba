//! End-to-end tests: real HTTP against the app over in-memory backends and a
//! scripted LLM. Run with `--nocapture` to see handler logs.

mod common;

mod agent;
mod chat;
mod memories;
mod research;
mod system;
mod verify;
