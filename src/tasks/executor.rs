//! 任务执行器
//!
//! 持有 TaskRegistry 与单次调用超时。超时视为瞬态失败，重试一次；仍失败则记为
//! Timeout。任务返回 Err 记为 Execution 失败。两种失败都作为 ActionOutcome
//! 数据回到循环，从不中止本轮；每次调用输出结构化审计日志（JSON）。
//!
//! 按名查不到任务返回 UnknownTask：白名单已在构造期校验，规划器也在解析期
//! 过滤未知名，这里触发即属实现缺陷。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::{ActionOutcome, AgentError, FailureKind};
use crate::tasks::{TaskInput, TaskRegistry};

/// 任务执行器：对每次调用施加超时，并将结果映射为 ActionOutcome
pub struct TaskExecutor {
    registry: TaskRegistry,
    timeout: Duration,
}

impl TaskExecutor {
    pub fn new(registry: TaskRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定任务；超时重试一次；输出 JSON 审计日志
    pub async fn execute(
        &self,
        task_name: &str,
        args: Value,
        meta: &[String],
    ) -> Result<ActionOutcome, AgentError> {
        let task = self
            .registry
            .get(task_name)
            .ok_or_else(|| AgentError::UnknownTask(task_name.to_string()))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let mut attempts = 0u32;

        let outcome = loop {
            attempts += 1;
            let input = TaskInput {
                args: args.clone(),
                meta: meta.to_vec(),
            };
            match timeout(self.timeout, task.execute(input)).await {
                Ok(Ok(content)) => break ActionOutcome::Success(content),
                Ok(Err(e)) => {
                    break ActionOutcome::Failure {
                        kind: FailureKind::Execution,
                        message: e,
                    }
                }
                Err(_) if attempts == 1 => continue,
                Err(_) => {
                    break ActionOutcome::Failure {
                        kind: FailureKind::Timeout,
                        message: format!("{task_name} exceeded {:?}", self.timeout),
                    }
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "task_audit",
            "task": task_name,
            "ok": outcome.is_success(),
            "attempts": attempts,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "task");

        Ok(outcome)
    }

    pub fn task_descriptions(&self) -> Vec<(String, String)> {
        self.registry.task_descriptions()
    }

    pub fn task_schema_json(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapipe::DatapipeKind;
    use crate::tasks::TaskRegistry;
    use serde_json::json;

    fn executor() -> TaskExecutor {
        let pipe = DatapipeKind::Memory.create();
        let registry =
            TaskRegistry::from_names(&["echo".into(), "recall".into()], &pipe).unwrap();
        TaskExecutor::new(registry, 5)
    }

    #[tokio::test]
    async fn test_success_maps_to_success_outcome() {
        let outcome = executor()
            .execute("echo", json!({"text": "hi"}), &[])
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Success(s) if s == "hi"));
    }

    #[tokio::test]
    async fn test_task_error_is_data_not_err() {
        let outcome = executor()
            .execute("recall", json!({"key": "dp-missing"}), &[])
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ActionOutcome::Failure { kind: FailureKind::Execution, .. }
        ));
    }

    #[tokio::test]
    async fn test_unregistered_task_is_a_defect() {
        let err = executor()
            .execute("no_such", json!({}), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownTask(_)));
    }
}
