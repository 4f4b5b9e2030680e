//! Language-model clients.
//!
//! The orchestrator treats a language model as an opaque delegation
//! capability; this crate supplies the HTTP-backed implementation.

pub mod client;
pub mod config;
pub mod openai;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, Sampling, TokenUsage};
pub use config::{LlmConfig, LlmProvider, ThrottledClient, build_llm_client};
pub use openai::OpenAiClient;
