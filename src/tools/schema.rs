//! 工具参数 Schema（schemars 由参数结构体自动生成）
//!
//! 同一个结构体既生成暴露给模型的 schema，又用于反序列化模型给出的参数。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::descriptor::normalize_schema;

/// 参数结构体 → 参数 schema（去掉 $schema / title / definitions 以外的元信息）
pub fn args_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    normalize_schema(Some(&value))
}

/// 解析工具参数：模型给出的 JSON 字符串或已解析的对象都接受
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let value = match args {
        Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
        Value::String(s) => serde_json::from_str::<Value>(&s)
            .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?,
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// 测试参数
    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct SampleArgs {
        /// 必填文本
        text: String,
        #[serde(default)]
        count: Option<u32>,
    }

    #[test]
    fn test_schema_is_object_with_required() {
        let schema = args_schema::<SampleArgs>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["text"]));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_parse_args_from_string_and_object() {
        let a: SampleArgs = parse_args(Value::String(r#"{"text":"hi"}"#.to_string())).unwrap();
        assert_eq!(a.text, "hi");
        let b: SampleArgs = parse_args(serde_json::json!({"text": "yo", "count": 2})).unwrap();
        assert_eq!(b.count, Some(2));
        assert!(parse_args::<SampleArgs>(Value::String("{oops".to_string())).is_err());
        assert!(matches!(
            parse_args::<SampleArgs>(serde_json::json!({})),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
