//! 回合内的工具调用记录
//!
//! 每一步是一条带 tool_calls 的 assistant 消息，加上每个调用对应的 tool 结果消息；
//! 结果在写入时就已是字符串，回放给模型时不会出现结构化 content。

use crate::message::{Message, ToolCall};

/// 一次工具调用及其（字符串）结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchEntry {
    pub call: ToolCall,
    pub output: String,
}

/// 一次 Thinking → ToolDispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchStep {
    pub assistant_content: Option<String>,
    pub entries: Vec<ScratchEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scratchpad {
    steps: Vec<ScratchStep>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_step(&mut self, assistant_content: Option<String>, entries: Vec<ScratchEntry>) {
        self.steps.push(ScratchStep {
            assistant_content,
            entries,
        });
    }

    /// 按派发顺序遍历所有记录
    pub fn entries(&self) -> impl Iterator<Item = &ScratchEntry> {
        self.steps.iter().flat_map(|s| s.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 转成回放给模型的消息
    pub fn to_messages(&self) -> Vec<Message> {
        let mut out = Vec::new();
        for step in &self.steps {
            let calls: Vec<ToolCall> = step.entries.iter().map(|e| e.call.clone()).collect();
            out.push(Message::assistant_tool_calls(
                step.assistant_content.clone(),
                calls,
            ));
            for entry in &step.entries {
                out.push(Message::tool(
                    entry.call.id.clone(),
                    entry.call.function_name.clone(),
                    entry.output.clone(),
                ));
            }
        }
        out
    }
}
