//! Datapipe：键值记忆存储
//!
//! 任务输出过大时不直接进 Action/上下文，而是 put 进 Datapipe 换一个 key，
//! 后续步骤按 key 显式取回。规划器从不直接访问存储，只有任务会；
//! 内容跨 reset 存活（上传产物与缓存检索的寿命长于一次推理重置）。

pub mod memory;

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::AgentError;

pub use memory::InMemoryDatapipe;

/// Datapipe 错误：目前只有 NotFound（get 了从未 put 过的 key）
#[derive(Error, Debug)]
pub enum DatapipeError {
    #[error("key not found: {0}")]
    NotFound(String),
}

/// 记忆存储 trait：put 返回新 key，get 按 key 取回
///
/// 并行分支可能同时 put；实现必须保证 key 生成无碰撞（原子计数器，而非先查后插）。
pub trait Datapipe: Send + Sync {
    /// 存入一个值，返回唯一 key
    fn put(&self, value: Value) -> String;

    /// 按 key 取回；不存在返回 NotFound，不 panic
    fn get(&self, key: &str) -> Result<Value, DatapipeError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 存储后端选择器：配置名在构造期解析为闭合枚举，之后不再按字符串分发
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatapipeKind {
    Memory,
}

impl FromStr for DatapipeKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(DatapipeKind::Memory),
            other => Err(AgentError::ConfigError(format!(
                "unknown datapipe backend: {other}"
            ))),
        }
    }
}

impl DatapipeKind {
    pub fn create(&self) -> Arc<dyn Datapipe> {
        match self {
            DatapipeKind::Memory => Arc::new(InMemoryDatapipe::new()),
        }
    }
}
