//! 工具描述规范化
//!
//! 任意形状的工具定义（裸 JSON、带 function 块、schema 为字符串等）统一成 ToolDescriptor：
//! name / description 非空，参数 schema 的 type 恒为 "object" 且 properties 为对象。
//! 格式化是幂等的：已合法的描述再格式化一次内容不变。

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const DEFAULT_DESCRIPTION: &str = "No description provided";

const SCHEMA_KEYS: [&str; 3] = ["parameterSchema", "parameters", "schema"];

/// 单个可调用工具的描述
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "parameterSchema")]
    pub parameters: Value,
}

impl ToolDescriptor {
    /// 构造并规范化
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        let name = name.into();
        let description = description.into();
        Self {
            name,
            description: if description.trim().is_empty() {
                DEFAULT_DESCRIPTION.to_string()
            } else {
                description
            },
            parameters: normalize_schema(Some(&parameters)),
        }
    }

    /// 从任意 JSON 解析；null 与非对象返回 None
    pub fn from_value(index: usize, raw: &Value) -> Option<Self> {
        let map = match raw {
            Value::Object(map) => map,
            Value::Null => return None,
            other => {
                tracing::debug!(index, value = %other, "dropping non-object tool definition");
                return None;
            }
        };
        let function = map.get("function").and_then(Value::as_object);

        let name = non_empty_str(map.get("name"))
            .or_else(|| function.and_then(|f| non_empty_str(f.get("name"))))
            .map(String::from)
            .unwrap_or_else(|| format!("tool_{index}"));
        let description = non_empty_str(map.get("description"))
            .or_else(|| function.and_then(|f| non_empty_str(f.get("description"))))
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string();

        let schema = SCHEMA_KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .or_else(|| function.and_then(|f| f.get("parameters")));
        let parameters = match (schema, function) {
            (Some(s), _) => normalize_schema(Some(s)),
            (None, Some(_)) => empty_schema(),
            (None, None) => default_input_schema(),
        };

        Some(Self {
            name,
            description,
            parameters,
        })
    }

    /// 对话补全 API 的 tools 项：{"type":"function","function":{name, description, parameters}}
    pub fn to_function_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": self.function_block(),
        })
    }

    /// 同时带 parameterSchema 与镜像 function 块的完整表示
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameterSchema": self.parameters,
            "function": self.function_block(),
        })
    }

    /// 可以暴露给模型：name / description 非空，schema 为 object
    pub fn is_exposable(&self) -> bool {
        !self.name.is_empty()
            && !self.description.is_empty()
            && self.parameters.get("type").and_then(Value::as_str) == Some("object")
    }

    fn function_block(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

/// 规范化一组工具定义：丢弃 null，补全名称 / 描述 / schema
pub fn format_tools(tools: &[Value]) -> Vec<ToolDescriptor> {
    tools
        .iter()
        .enumerate()
        .filter_map(|(i, t)| ToolDescriptor::from_value(i, t))
        .collect()
}

/// 参数 schema 规范化：字符串先解析，type 强制 object，properties 强制为对象
pub fn normalize_schema(schema: Option<&Value>) -> Value {
    let parsed;
    let schema = match schema {
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(e) => {
                tracing::debug!(error = %e, "unparsable schema string, using empty schema");
                return empty_schema();
            }
        },
        Some(v) => v,
        None => return empty_schema(),
    };

    let Value::Object(map) = schema else {
        return empty_schema();
    };

    let mut out: Map<String, Value> = map.clone();
    out.insert("type".to_string(), Value::String("object".to_string()));
    if !matches!(out.get("properties"), Some(Value::Object(_))) {
        out.insert("properties".to_string(), Value::Object(Map::new()));
    }
    match out.get("required") {
        Some(Value::Array(items)) => {
            let names: Vec<Value> = items.iter().filter(|v| v.is_string()).cloned().collect();
            out.insert("required".to_string(), Value::Array(names));
        }
        Some(_) => {
            out.remove("required");
        }
        None => {}
    }
    Value::Object(out)
}

pub fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// 既没有 schema 也没有 function 块时的默认参数：单个字符串 input
pub fn default_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"input": {"type": "string"}},
        "required": ["input"]
    })
}

fn non_empty_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}
