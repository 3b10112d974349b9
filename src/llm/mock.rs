//! Mock 与脚本化 LLM 客户端（测试与离线运行，无需 API）
//!
//! MockLlmClient 让整个规划循环离线可跑：首步回一个 echo 任务调用，
//! 之后回最终答案。ScriptedLlm 按预置脚本逐条出队，供测试精确驱动循环。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：尚无步骤记录时回 echo 调用，否则回最终答案
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        if last_user.contains("Steps so far:\n(none)") {
            Ok(r#"{"task": "echo", "args": {"text": "Echo from mock"}, "rationale": "demo step"}"#
                .to_string())
        } else {
            Ok(r#"{"final": "Echo from mock"}"#.to_string())
        }
    }
}

/// 脚本化客户端：按顺序返回预置输出；脚本耗尽返回 Err
pub struct ScriptedLlm {
    outputs: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(outputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 已消费的调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.outputs
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .ok_or_else(|| "script exhausted".to_string())
    }
}
