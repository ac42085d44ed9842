//! LLM 层：后端抽象与实现（OpenAI / Azure / Mock），以及带修复阶梯的对话客户端

pub mod client;
pub mod mock;
pub mod openai;
pub mod traits;

pub use client::{ChatModelClient, FALLBACK_PROMPT};
pub use mock::{MockLlmClient, RecordedCall};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{ChatOptions, LlmClient, LlmError};
