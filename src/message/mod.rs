//! 规范消息与消息规范化

pub mod normalize;
pub mod types;

pub use normalize::{
    coerce_text, is_valid_part_array, normalize, normalize_all, normalize_all_with_default,
    normalize_history, normalize_messages, DEFAULT_PROMPT,
};
pub use types::{
    AssistantMessage, ContentPart, FunctionCall, ImageUrl, Message, MessageContent, Role, ToolCall,
};
