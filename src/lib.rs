//! Magpie - Rust 会话智能体外壳
//!
//! 模块划分：
//! - **agent**: 面向调用方的外壳（历史渲染、meta 附件、reset）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、Action 记录、编排器主循环、并发调度
//! - **datapipe**: 键值记忆存储（大体积中间产物不进推理上下文）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **planner**: 规划器（顺序 ReAct / 分支树搜索）与决策解析
//! - **respond**: 响应生成器（Base / Traced）
//! - **tasks**: 任务能力接口、注册表（构造期白名单）与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod datapipe;
pub mod llm;
pub mod observability;
pub mod planner;
pub mod respond;
pub mod tasks;

pub use agent::Agent;
pub use crate::core::{Action, ActionOutcome, AgentError, Orchestrator, TurnRequest};
