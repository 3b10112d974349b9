//! Echo 任务（测试用）

use async_trait::async_trait;

use crate::tasks::{Task, TaskInput};

/// Echo 任务：回显文本
pub struct EchoTask;

#[async_trait]
impl Task for EchoTask {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text (for testing). Args: {\"text\": \"message\"}"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, input: TaskInput) -> Result<String, String> {
        let text = input
            .args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        Ok(text.to_string())
    }
}
