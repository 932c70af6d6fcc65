//! LLM provider adapters.
//!
//! The core holds a `dyn LlmProvider`; this crate supplies the concrete
//! backends. `OpenAiCompatProvider` covers the vast majority of hosted
//! and local endpoints (OpenAI, OpenRouter, Ollama, vLLM, proxies).

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
