//! Scene Agent - 自然语言描述 3D 场景的工具调用 Agent
//!
//! 模块划分：
//! - **message**: 消息类型与净化（任意形状输入 → 规范消息）
//! - **llm**: 模型后端抽象（OpenAI / Azure / Mock）与三级修复的 ChatModelClient
//! - **tools**: 工具描述、注册表、执行器与五个场景工具
//! - **react**: 回合状态机、工具调用记录、提示词
//! - **correlator**: 远端工具请求与浏览器回传结果的关联
//! - **sandbox**: 浏览器端执行代码的静态黑名单
//! - **transport**: 出入站事件、轮询队列与进程内通道
//! - **runtime**: 入站事件路由
//! - **gateway** / **web**: WebSocket 网关与 HTTP 轮询端点
//! - **config** / **observability** / **core**: 配置、日志、错误

pub mod config;
pub mod core;
pub mod correlator;
#[cfg(feature = "gateway")]
pub mod gateway;
pub mod llm;
pub mod message;
pub mod observability;
pub mod react;
pub mod runtime;
pub mod sandbox;
pub mod tools;
pub mod transport;
#[cfg(feature = "web")]
pub mod web;

pub use runtime::AgentRuntime;
