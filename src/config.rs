//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCENE__*` 覆盖（双下划线表示嵌套，如 `SCENE__LLM__PROVIDER=azure`）。
//! API Key 只从环境变量读取（OPENAI_API_KEY / AZURE_OPENAI_API_KEY），不进入配置文件。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::llm::FALLBACK_PROMPT;
use crate::message::DEFAULT_PROMPT;
use crate::react::prompt::AGENT_SYSTEM_PROMPT;
use crate::react::DEFAULT_MAX_ITERATIONS;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmConfig,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub gateway: GatewaySection,
}

/// [app] 段：应用名、可选的系统提示文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 覆盖内置系统提示的文件路径
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "scene-agent".to_string(),
            system_prompt_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    #[serde(alias = "open_ai")]
    OpenAi,
    Azure,
}

/// [llm] 段：后端选择、模型、温度与修复阶梯的兜底提示
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub fallback_prompt: String,
    pub azure: AzureSection,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o".to_string(),
            base_url: None,
            temperature: 0.0,
            fallback_prompt: FALLBACK_PROMPT.to_string(),
            azure: AzureSection::default(),
        }
    }
}

/// [llm.azure] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AzureSection {
    /// 形如 https://<resource>.openai.azure.com
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

impl Default for AzureSection {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: String::new(),
            api_version: "2024-02-15-preview".to_string(),
        }
    }
}

/// [agent] 段：迭代上限与空列表时的默认提示
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: usize,
    pub default_prompt: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            default_prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// [tools] 段：远端结果等待时长、单次工具调用总超时（秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub remote_timeout_secs: u64,
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            remote_timeout_secs: 30,
            tool_timeout_secs: 60,
        }
    }
}

/// [gateway] 段：监听地址、轮询队列消息存活时长
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub bind_addr: String,
    pub message_ttl_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            message_ttl_secs: 30,
        }
    }
}

impl AppConfig {
    /// 系统提示：配置了文件则读文件，读取失败回退到内置提示
    pub fn system_prompt(&self) -> String {
        match &self.app.system_prompt_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => AGENT_SYSTEM_PROMPT.to_string(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read system prompt, using built-in prompt");
                    AGENT_SYSTEM_PROMPT.to_string()
                }
            },
            None => AGENT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 SCENE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCENE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCENE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, LlmProvider::OpenAi);
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.agent.max_iterations, 5);
        assert_eq!(cfg.tools.remote_timeout_secs, 30);
        assert_eq!(cfg.gateway.message_ttl_secs, 30);
        assert_eq!(cfg.llm.azure.api_version, "2024-02-15-preview");
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"azure\"\n[llm.azure]\nendpoint = \"https://x.openai.azure.com\"\ndeployment = \"gpt4\"\n[agent]\nmax_iterations = 3"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, LlmProvider::Azure);
        assert_eq!(cfg.llm.azure.deployment, "gpt4");
        assert_eq!(cfg.agent.max_iterations, 3);
        assert_eq!(cfg.tools.tool_timeout_secs, 60);
    }

    #[test]
    fn test_missing_prompt_file_falls_back() {
        let mut cfg = AppConfig::default();
        cfg.app.system_prompt_path = Some(PathBuf::from("/definitely/not/here.txt"));
        assert_eq!(cfg.system_prompt(), AGENT_SYSTEM_PROMPT);
    }
}
