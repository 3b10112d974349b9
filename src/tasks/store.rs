//! Store 任务：把大体积内容放进 Datapipe，换回一个 key
//!
//! 后续步骤用 recall 按 key 取回，避免把整段产物塞进推理上下文。

use std::sync::Arc;

use async_trait::async_trait;

use crate::datapipe::Datapipe;
use crate::tasks::{Task, TaskInput};

pub struct StoreTask {
    pipe: Arc<dyn Datapipe>,
}

impl StoreTask {
    pub fn new(pipe: Arc<dyn Datapipe>) -> Self {
        Self { pipe }
    }
}

#[async_trait]
impl Task for StoreTask {
    fn name(&self) -> &str {
        "store"
    }

    fn description(&self) -> &str {
        "Store a value in the datapipe and return its key. Args: {\"value\": <any json>}"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "value": {} },
            "required": ["value"]
        })
    }

    async fn execute(&self, input: TaskInput) -> Result<String, String> {
        let value = input
            .args
            .get("value")
            .cloned()
            .ok_or_else(|| "missing \"value\" argument".to_string())?;
        let key = self.pipe.put(value);
        Ok(key)
    }
}
