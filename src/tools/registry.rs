//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 注册时描述即被规范化为 ToolDescriptor，之后统一使用；暴露给模型的顺序即注册顺序。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::descriptor::{empty_schema, ToolDescriptor};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（模型 tool_calls 中的 function.name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认无参数
    fn parameters_schema(&self) -> Value {
        empty_schema()
    }

    /// 执行工具；args 为模型给出的参数（JSON 字符串或对象）
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

struct Entry {
    descriptor: ToolDescriptor,
    tool: Arc<dyn Tool>,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / execute / tool_names
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具会被替换
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    /// 名称为空的工具以 tool_<序号> 注册，查找与暴露都用该名称
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let mut descriptor = ToolDescriptor::new(
            tool.name(),
            tool.description(),
            tool.parameters_schema(),
        );
        if descriptor.name.trim().is_empty() {
            descriptor.name = format!("tool_{}", self.entries.len());
            tracing::warn!(tool = %descriptor.name, "tool has no name, using positional name");
        }
        let entry = Entry { descriptor, tool };
        match self.index.get(&entry.descriptor.name) {
            Some(&i) => {
                tracing::warn!(tool = %entry.descriptor.name, "replacing registered tool");
                self.entries[i] = entry;
            }
            None => {
                self.index
                    .insert(entry.descriptor.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.entries[i].tool))
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.descriptor.name.clone()).collect()
    }

    /// 规范化后的描述（注册顺序）
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
