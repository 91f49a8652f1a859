//! AssistGen - customer-support chat backend
//!
//! An async HTTP server proxying chat requests to LLM providers (DeepSeek
//! API or a local Ollama server) and relaying their streamed output to
//! clients with thinking/response classification, backed by a MySQL
//! user/auth layer.
//!
//! # Architecture
//!
//! - `relay`: the streamed-response relay and token-classification pipeline
//! - `providers`: streaming clients for the configured model backends
//! - `server` + `auth` + `db`: the HTTP surface and user store
//! - `search`: web-search-augmented chat turns
//! - `client`: terminal chat client consuming the relayed stream
//! - `bench` + `doctor`: Ollama load testing and deployment diagnostics

pub mod auth;
pub mod bench;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod doctor;
pub mod errors;
pub mod providers;
pub mod relay;
pub mod search;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use errors::{AppError, Result};
