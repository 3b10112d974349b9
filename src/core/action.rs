//! Action：一次规划步骤的不可变记录
//!
//! 由规划器选定（任务名 + 参数 + 理由），编排器执行后补上结果并追加到
//! previous_actions；追加后不再修改，序列只增不减，仅显式 reset 可整体清空。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 任务层失败分类；超时视为可重试一次的瞬态失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Execution,
    Timeout,
}

/// 任务执行结果：成功文本或带分类的失败；失败是数据而非错误，循环照常继续
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionOutcome {
    Success(String),
    Failure { kind: FailureKind, message: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success(_))
    }

    /// 供 transcript / prompt 使用的单行文本
    pub fn text(&self) -> String {
        match self {
            ActionOutcome::Success(s) => s.clone(),
            ActionOutcome::Failure { kind, message } => {
                let kind = match kind {
                    FailureKind::Execution => "failed",
                    FailureKind::Timeout => "timed out",
                };
                format!("[{kind}] {message}")
            }
        }
    }
}

/// 单条规划步骤记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub task: String,
    pub input: Value,
    pub outcome: ActionOutcome,
    pub rationale: Option<String>,
    pub at: DateTime<Utc>,
}

impl Action {
    pub fn new(
        task: impl Into<String>,
        input: Value,
        outcome: ActionOutcome,
        rationale: Option<String>,
    ) -> Self {
        Self {
            task: task.into(),
            input,
            outcome,
            rationale,
            at: Utc::now(),
        }
    }

    /// 一行摘要：任务名 + 参数 + 结果，用于 prompt 与降级回复
    pub fn summary(&self) -> String {
        format!("{}({}) -> {}", self.task, self.input, self.outcome.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_text_includes_kind() {
        let a = Action::new(
            "recall",
            json!({"key": "dp-0"}),
            ActionOutcome::Failure {
                kind: FailureKind::Timeout,
                message: "deadline".into(),
            },
            None,
        );
        assert!(!a.outcome.is_success());
        assert!(a.summary().contains("timed out"));
    }

    #[test]
    fn test_action_roundtrips_through_serde() {
        let a = Action::new("echo", json!({"text": "hi"}), ActionOutcome::Success("hi".into()), Some("why".into()));
        let s = serde_json::to_string(&a).unwrap();
        let back: Action = serde_json::from_str(&s).unwrap();
        assert_eq!(back.task, "echo");
        assert!(back.outcome.is_success());
    }
}
