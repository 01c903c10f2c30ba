//! Request handlers, one module per API area.

pub mod admin;
pub mod agent;
pub mod chat;
pub mod code_assist;
pub mod memories;
pub mod research;
pub mod system;
pub mod verify;
