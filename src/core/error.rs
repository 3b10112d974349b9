//! Agent 错误类型
//!
//! 构造期错误（UnknownTask / ConfigError）直接向调用方冒泡；循环内错误（LLM、解析）
//! 由规划器吸收并重试，任务层失败记为 ActionOutcome::Failure 而非 Err。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 白名单中出现未注册任务名；构造期致命，会话不应被创建
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 后端输出无法解析为决策；规划器内部重试若干次后强制收尾
    #[error("Planner parse failure: {0}")]
    PlannerParseFailure(String),

    /// 仅在尚无任何已记录工作时向外冒泡；有工作则走降级完成
    #[error("Cancelled")]
    Cancelled,

    /// 响应生成器收到空 transcript 且无草稿答案；编排器实现正确时不可达
    #[error("Nothing to render")]
    NothingToRender,
}
