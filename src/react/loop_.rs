//! 回合状态机
//!
//! Start → Thinking → (ToolDispatch ⇄ Thinking)* → Responding → Done / Failed
//!
//! - 同一步里的多个工具调用按模型给出的顺序串行执行，记录顺序即派发顺序
//! - 每次 Thinking 前检查迭代上限，到达上限直接进入 Responding 并给出降级提示
//! - 只有修复阶梯后的 ModelCallError 会让回合以 Failed 结束；工具失败只作为结果回传给模型
//! - 进度事件经 event_tx 发送，发送失败不影响回合

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::ModelCallError;
use crate::llm::ChatModelClient;
use crate::message::{coerce_text, normalize_history, Message, ToolCall};
use crate::react::prompt::AGENT_SYSTEM_PROMPT;
use crate::react::{ReactEvent, ScratchEntry, Scratchpad};
use crate::tools::ToolExecutor;

/// 默认最大迭代次数
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// 模型调用最终失败时给用户的文本
pub const USER_SAFE_ERROR: &str = "处理请求时出错，请稍后重试。";

/// 模型给出空回复时的文本
const EMPTY_REPLY: &str = "已处理完成。";

/// 回合状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Start,
    Thinking,
    ToolDispatch,
    Responding,
    Done,
    Failed,
}

/// 一个回合的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// 给用户的最终文本（失败时为用户可见的错误文本）
    pub output: String,
    /// Done 或 Failed
    pub state: TurnState,
    /// 调用模型的次数
    pub iterations: usize,
    /// 完成的 ToolDispatch 次数
    pub dispatches: usize,
    pub hit_iteration_limit: bool,
    pub scratchpad: Scratchpad,
    pub error: Option<ModelCallError>,
}

impl TurnOutcome {
    pub fn is_done(&self) -> bool {
        self.state == TurnState::Done
    }
}

/// 一个回合的输入与进行中的状态
struct AgentTurn {
    input: String,
    history: Vec<Message>,
    scratchpad: Scratchpad,
    iteration: usize,
    dispatches: usize,
    state: TurnState,
}

impl AgentTurn {
    fn transition(&mut self, next: TurnState) {
        tracing::debug!(from = ?self.state, to = ?next, iteration = self.iteration, "turn state");
        self.state = next;
    }
}

fn send_event(tx: Option<&UnboundedSender<ReactEvent>>, ev: ReactEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

/// 回合执行器：持有模型客户端、工具执行器与系统提示
pub struct AgentExecutor {
    client: ChatModelClient,
    tools: Arc<ToolExecutor>,
    system_prompt: String,
    max_iterations: usize,
}

impl AgentExecutor {
    pub fn new(client: ChatModelClient, tools: Arc<ToolExecutor>) -> Self {
        Self {
            client,
            tools,
            system_prompt: AGENT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 上限至少为 1
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// 执行一个回合；input / history 可以是任意 JSON，入口处即被规范化
    pub async fn invoke(
        &self,
        input: &Value,
        history: &Value,
        event_tx: Option<&UnboundedSender<ReactEvent>>,
    ) -> TurnOutcome {
        let mut turn = AgentTurn {
            input: coerce_text(input),
            history: normalize_history(history),
            scratchpad: Scratchpad::new(),
            iteration: 0,
            dispatches: 0,
            state: TurnState::Start,
        };
        tracing::info!(
            input_len = turn.input.len(),
            history = turn.history.len(),
            "turn started"
        );

        let tools = self.tools.descriptors();
        let mut hit_limit = false;

        let final_text = loop {
            if turn.iteration >= self.max_iterations {
                tracing::warn!(max = self.max_iterations, "iteration limit reached");
                send_event(
                    event_tx,
                    ReactEvent::IterationLimit {
                        max_steps: self.max_iterations,
                    },
                );
                hit_limit = true;
                turn.transition(TurnState::Responding);
                break self.limit_notice(&turn.scratchpad);
            }

            turn.iteration += 1;
            turn.transition(TurnState::Thinking);
            send_event(
                event_tx,
                ReactEvent::StepUpdate {
                    step: turn.iteration,
                    max_steps: self.max_iterations,
                },
            );
            send_event(event_tx, ReactEvent::Thinking);

            let messages = self.build_messages(&turn);
            let reply = match self.client.invoke(&messages, &tools).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(error = %e, tier = %e.tier, "turn failed");
                    turn.transition(TurnState::Responding);
                    send_event(
                        event_tx,
                        ReactEvent::Error {
                            text: USER_SAFE_ERROR.to_string(),
                        },
                    );
                    turn.transition(TurnState::Failed);
                    return TurnOutcome {
                        output: USER_SAFE_ERROR.to_string(),
                        state: turn.state,
                        iterations: turn.iteration,
                        dispatches: turn.dispatches,
                        hit_iteration_limit: false,
                        scratchpad: turn.scratchpad,
                        error: Some(e),
                    };
                }
            };

            if !reply.has_tool_calls() {
                turn.transition(TurnState::Responding);
                let text = reply.text_or_empty();
                break if text.is_empty() {
                    EMPTY_REPLY.to_string()
                } else {
                    text.to_string()
                };
            }

            turn.transition(TurnState::ToolDispatch);
            let mut entries = Vec::with_capacity(reply.tool_calls.len());
            for (i, call) in reply.tool_calls.iter().enumerate() {
                let call = with_call_id(call, turn.iteration, i);
                send_event(
                    event_tx,
                    ReactEvent::ToolStarted {
                        call_id: call.id.clone(),
                        tool: call.function_name.clone(),
                    },
                );
                let run = self.tools.run(&call).await;
                send_event(
                    event_tx,
                    ReactEvent::ToolFinished {
                        call_id: call.id.clone(),
                        tool: call.function_name.clone(),
                        success: run.success,
                    },
                );
                entries.push(ScratchEntry {
                    call,
                    output: run.output,
                });
            }
            turn.scratchpad.push_step(reply.content.clone(), entries);
            turn.dispatches += 1;
        };

        send_event(
            event_tx,
            ReactEvent::MessageDone {
                text: final_text.clone(),
            },
        );
        turn.transition(TurnState::Done);
        tracing::info!(
            iterations = turn.iteration,
            dispatches = turn.dispatches,
            tool_calls = turn.scratchpad.len(),
            hit_limit,
            "turn finished"
        );

        TurnOutcome {
            output: final_text,
            state: turn.state,
            iterations: turn.iteration,
            dispatches: turn.dispatches,
            hit_iteration_limit: hit_limit,
            scratchpad: turn.scratchpad,
            error: None,
        }
    }

    /// system → history → 当前输入 → 本回合的工具调用记录
    fn build_messages(&self, turn: &AgentTurn) -> Vec<Message> {
        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(turn.history.iter().cloned());
        messages.push(Message::user(turn.input.clone()));
        messages.extend(turn.scratchpad.to_messages());
        messages
    }

    fn limit_notice(&self, scratchpad: &Scratchpad) -> String {
        let mut text = format!(
            "已达到最大迭代次数（{}），任务可能没有全部完成。",
            self.max_iterations
        );
        if let Some(last) = scratchpad.entries().last() {
            text.push_str(&format!(
                "最后一次调用的工具是 {}。",
                last.call.function_name
            ));
        }
        text
    }
}

/// API 要求 tool 消息引用非空 id；模型未给出时按位置生成
fn with_call_id(call: &ToolCall, iteration: usize, index: usize) -> ToolCall {
    let mut call = call.clone();
    if call.id.trim().is_empty() {
        call.id = format!("call_{iteration}_{index}");
    }
    call
}
