//! 消息规范化
//!
//! 把任意 JSON 值（前端传来的 chatHistory、工具输出、模型回复等）强制转成规范 Message：
//! - 非对象 / null → user 消息，content 为其文本
//! - role 缺失或不可识别 → user
//! - content：null → ""；字符串原样；合法 text / image_url 分段数组原样；其余对象 / 数组 → JSON 字符串
//! - function_call.arguments 与 tool_calls[i].function.arguments 一律序列化为字符串，失败时为 "{}"
//! - content 内任意层级的 agent_scratchpad 先被序列化为字符串，再整体序列化 content
//!
//! 输出永远满足：content 是字符串或合法分段数组；normalize_all 永远不返回空列表。

use serde_json::{Map, Value};

use crate::core::MessageFormatError;
use crate::message::{ContentPart, FunctionCall, Message, MessageContent, Role, ToolCall};

/// 消息列表为空时补入的默认提示
pub const DEFAULT_PROMPT: &str = "Please help me with Three.js code generation.";

/// content 允许的最大嵌套层数，超出时视为无法修复
pub const MAX_CONTENT_DEPTH: usize = 64;

const SCRATCHPAD_KEYS: [&str; 2] = ["agent_scratchpad", "agentScratchpad"];
const TOOL_CALLS_KEYS: [&str; 2] = ["tool_calls", "toolCalls"];
const FUNCTION_CALL_KEYS: [&str; 2] = ["function_call", "functionCall"];
const TOOL_CALL_ID_KEYS: [&str; 2] = ["tool_call_id", "toolCallId"];

/// 规范化单条消息
pub fn normalize(value: &Value) -> Message {
    match value {
        Value::Object(map) => normalize_object(map),
        other => {
            tracing::debug!(kind = value_kind(other), "message is not an object, wrapping as user text");
            Message::user(coerce_text(other))
        }
    }
}

/// 规范化消息列表；非数组输入包成单元素列表，结果为空时补一条默认提示
pub fn normalize_all(values: &Value) -> Vec<Message> {
    normalize_all_with_default(values, DEFAULT_PROMPT)
}

pub fn normalize_all_with_default(values: &Value, default_prompt: &str) -> Vec<Message> {
    let mut messages = match values {
        Value::Array(items) => items.iter().map(normalize).collect::<Vec<_>>(),
        other => vec![normalize(other)],
    };
    if messages.is_empty() {
        tracing::warn!("message list is empty, inserting default prompt");
        messages.push(Message::user(default_prompt));
    }
    messages
}

/// 对已是 Message 的列表再走一遍规范化（发往外部 API 前的最后一道关）
pub fn normalize_messages(messages: &[Message], default_prompt: &str) -> Vec<Message> {
    let mut out: Vec<Message> = messages
        .iter()
        .map(|m| match serde_json::to_value(m) {
            Ok(v) => normalize(&v),
            Err(e) => {
                tracing::warn!(error = %e, "message could not be re-encoded, replacing with empty user message");
                Message::user("")
            }
        })
        .collect();
    if out.is_empty() {
        tracing::warn!("message list is empty, inserting default prompt");
        out.push(Message::user(default_prompt));
    }
    out
}

/// 规范化对话历史：与 normalize_all 相同，但 null / 空数组得到空历史而不是默认提示
pub fn normalize_history(value: &Value) -> Vec<Message> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(normalize).collect(),
        other => vec![normalize(other)],
    }
}

/// 任意值转文本：字符串原样，null 为空串，其余取 JSON 文本
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// 是否为合法分段数组：每个元素都是 text 或 image_url 分段
pub fn is_valid_part_array(value: &Value) -> bool {
    parse_parts(value).is_some()
}

fn parse_parts(value: &Value) -> Option<Vec<ContentPart>> {
    let items = value.as_array()?;
    let tagged = items.iter().all(|item| {
        matches!(
            item.get("type").and_then(Value::as_str),
            Some("text") | Some("image_url")
        )
    });
    if !tagged {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn normalize_object(map: &Map<String, Value>) -> Message {
    let role = match map.get("role").and_then(Value::as_str).and_then(Role::parse) {
        Some(r) => r,
        None => {
            tracing::debug!(role = ?map.get("role"), "missing or unknown role, defaulting to user");
            Role::User
        }
    };

    let mut msg = Message::new(role, normalize_content(map.get("content")));
    msg.name = map.get("name").and_then(scalar_text);
    msg.tool_call_id = first_key(map, &TOOL_CALL_ID_KEYS).and_then(scalar_text);

    if let Some(Value::Array(calls)) = first_key(map, &TOOL_CALLS_KEYS) {
        let calls: Vec<ToolCall> = calls.iter().filter_map(normalize_tool_call).collect();
        if !calls.is_empty() {
            msg.tool_calls = Some(calls);
        }
    }

    if let Some(Value::Object(fc)) = first_key(map, &FUNCTION_CALL_KEYS) {
        msg.function_call = Some(FunctionCall {
            name: fc.get("name").and_then(scalar_text).unwrap_or_default(),
            arguments: stringify_arguments(fc.get("arguments")),
        });
    }

    msg
}

fn normalize_content(content: Option<&Value>) -> MessageContent {
    match content {
        None | Some(Value::Null) => MessageContent::Text(String::new()),
        Some(Value::String(s)) => MessageContent::Text(s.clone()),
        Some(v @ Value::Array(_)) => match parse_parts(v) {
            Some(parts) => MessageContent::Parts(parts),
            None => stringify_or_empty(v),
        },
        Some(v @ Value::Object(_)) => stringify_or_empty(v),
        Some(other) => MessageContent::Text(coerce_text(other)),
    }
}

fn stringify_or_empty(value: &Value) -> MessageContent {
    match stringify_content(value) {
        Ok(s) => MessageContent::Text(s),
        Err(e) => {
            tracing::warn!(error = %e, "content could not be repaired, forcing empty string");
            MessageContent::Text(String::new())
        }
    }
}

/// 对象 / 数组 content → JSON 字符串；其中的 agent_scratchpad 先单独序列化
fn stringify_content(value: &Value) -> Result<String, MessageFormatError> {
    if exceeds_depth(value, MAX_CONTENT_DEPTH) {
        return Err(MessageFormatError::NestingTooDeep {
            limit: MAX_CONTENT_DEPTH,
        });
    }
    let mut value = value.clone();
    flatten_scratchpad(&mut value);
    serde_json::to_string(&value).map_err(|e| MessageFormatError::Unserializable(e.to_string()))
}

fn flatten_scratchpad(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let structured = matches!(child, Value::Object(_) | Value::Array(_));
                if structured && SCRATCHPAD_KEYS.contains(&key.as_str()) {
                    let text = serde_json::to_string(child).unwrap_or_default();
                    *child = Value::String(text);
                } else {
                    flatten_scratchpad(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(flatten_scratchpad),
        _ => {}
    }
}

fn exceeds_depth(value: &Value, limit: usize) -> bool {
    let mut stack = vec![(value, 1usize)];
    while let Some((v, depth)) = stack.pop() {
        if depth > limit {
            return true;
        }
        match v {
            Value::Array(items) => stack.extend(items.iter().map(|i| (i, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|i| (i, depth + 1))),
            _ => {}
        }
    }
    false
}

fn normalize_tool_call(value: &Value) -> Option<ToolCall> {
    let map = value.as_object()?;
    let id = map.get("id").and_then(scalar_text).unwrap_or_default();
    let (name, arguments) = match map.get("function") {
        Some(Value::Object(f)) => (f.get("name"), f.get("arguments")),
        // LangChain 风格：{id, name, args}
        _ => (map.get("name"), map.get("args").or_else(|| map.get("arguments"))),
    };
    Some(ToolCall {
        id,
        function_name: name.and_then(scalar_text).unwrap_or_default(),
        arguments: stringify_arguments(arguments),
    })
}

fn stringify_arguments(arguments: Option<&Value>) -> String {
    match arguments {
        None | Some(Value::Null) => "{}".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 依次取第一个存在且非 null 的键
fn first_key<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
