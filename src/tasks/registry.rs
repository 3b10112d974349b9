//! 任务注册表
//!
//! 所有任务实现 Task trait（name / description / parameters_schema / execute），
//! TaskRegistry 按构造期白名单一次性解析任务名；未知名立即失败（fail fast），
//! 而不是等到循环中按名查找才暴露。

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::datapipe::Datapipe;
use crate::tasks::{EchoTask, RecallTask, StoreTask};

/// 任务输入：规划器给出的 JSON 参数 + 会话级 meta 句柄
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub args: Value,
    pub meta: Vec<String>,
}

/// 任务 trait：名称、描述（供规划器列举可用能力）、参数 schema、异步执行
///
/// 副作用（Datapipe 写入等）由任务自身负责，且必须可安全重试一次。
#[async_trait]
pub trait Task: Send + Sync {
    /// 任务名称（用于决策 JSON 中的 "task" 字段）
    fn name(&self) -> &str;

    /// 任务描述（供规划器理解适用场景）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认空对象表示无参数约束
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行任务；Err 表示任务层失败（被记录为 Failure，不中止循环）
    async fn execute(&self, input: TaskInput) -> Result<String, String>;
}

/// 任务选择器：白名单中的名字在构造期解析为闭合枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Echo,
    Store,
    Recall,
}

impl FromStr for TaskKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "echo" => Ok(TaskKind::Echo),
            "store" => Ok(TaskKind::Store),
            "recall" => Ok(TaskKind::Recall),
            other => Err(AgentError::UnknownTask(other.to_string())),
        }
    }
}

impl TaskKind {
    fn construct(&self, pipe: &Arc<dyn Datapipe>) -> Arc<dyn Task> {
        match self {
            TaskKind::Echo => Arc::new(EchoTask),
            TaskKind::Store => Arc::new(StoreTask::new(pipe.clone())),
            TaskKind::Recall => Arc::new(RecallTask::new(pipe.clone())),
        }
    }
}

/// 任务注册表：按名称存储 Arc<dyn Task>
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从白名单构造注册表；任何未知任务名使整个构造失败
    pub fn from_names(
        names: &[String],
        pipe: &Arc<dyn Datapipe>,
    ) -> Result<Self, AgentError> {
        let mut registry = Self::new();
        for name in names {
            let kind = TaskKind::from_str(name)?;
            let task = kind.construct(pipe);
            registry.tasks.insert(task.name().to_string(), task);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的 Available tasks 段落
    pub fn task_descriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .tasks
            .iter()
            .map(|(name, task)| (name.clone(), task.description().to_string()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// 按名生成任务 schema JSON，供外部按名自省
    pub fn to_schema_json(&self) -> String {
        let names = self.task_names();
        let tasks: Vec<serde_json::Value> = names
            .iter()
            .filter_map(|name| self.tasks.get(name))
            .map(|task| {
                serde_json::json!({
                    "name": task.name(),
                    "description": task.description(),
                    "parameters": task.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tasks).unwrap_or_else(|_| "[]".to_string())
    }
}
