//! Recall 任务：按 key 从 Datapipe 取回此前存入的内容
//!
//! key 不存在是任务层失败（记入 Action，循环继续），不是崩溃。

use std::sync::Arc;

use async_trait::async_trait;

use crate::datapipe::Datapipe;
use crate::tasks::{Task, TaskInput};

pub struct RecallTask {
    pipe: Arc<dyn Datapipe>,
}

impl RecallTask {
    pub fn new(pipe: Arc<dyn Datapipe>) -> Self {
        Self { pipe }
    }
}

#[async_trait]
impl Task for RecallTask {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Fetch a value from the datapipe by key. Args: {\"key\": \"dp-...\"}"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "key": { "type": "string" } },
            "required": ["key"]
        })
    }

    async fn execute(&self, input: TaskInput) -> Result<String, String> {
        let key = input
            .args
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing \"key\" argument".to_string())?;
        let value = self.pipe.get(key).map_err(|e| e.to_string())?;
        Ok(value.to_string())
    }
}
