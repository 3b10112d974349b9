//! 响应生成器：把最终推理结果变成面向用户的文本
//!
//! 两个变体都保证草稿答案逐字出现在输出里；traced 额外附确定性的步骤摘要。
//! 空 transcript 且无草稿是 NothingToRender（不变式：编排器实现正确时不会
//! 以该状态调用生成器，这里的检查只是兜底）。

use std::str::FromStr;

use crate::core::{Action, AgentError};
use crate::planner::render_transcript;

/// 响应生成器 trait
pub trait ResponseGenerator: Send + Sync {
    /// draft 为规划器给出的答案草稿；degraded 表示预算耗尽/取消的降级完成
    fn generate(
        &self,
        draft: Option<&str>,
        actions: &[Action],
        degraded: bool,
    ) -> Result<String, AgentError>;
}

/// 生成器选择器：配置名在构造期解析一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseGeneratorKind {
    Base,
    Traced,
}

impl FromStr for ResponseGeneratorKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(ResponseGeneratorKind::Base),
            "traced" => Ok(ResponseGeneratorKind::Traced),
            other => Err(AgentError::ConfigError(format!(
                "unknown response generator: {other}"
            ))),
        }
    }
}

impl ResponseGeneratorKind {
    pub fn create(&self) -> Box<dyn ResponseGenerator> {
        match self {
            ResponseGeneratorKind::Base => Box::new(BaseGenerator),
            ResponseGeneratorKind::Traced => Box::new(TracedGenerator),
        }
    }
}

/// 草稿与降级情况的共同渲染逻辑
fn render_draft(
    draft: Option<&str>,
    actions: &[Action],
    degraded: bool,
) -> Result<String, AgentError> {
    match draft {
        Some(text) => Ok(text.to_string()),
        None => {
            if actions.is_empty() {
                return Err(AgentError::NothingToRender);
            }
            let mut text = String::from(
                "I ran out of planning budget before reaching a final answer. \
                 Here is what I gathered:\n",
            );
            text.push_str(&render_transcript(actions));
            if degraded {
                tracing::debug!(steps = actions.len(), "degraded completion rendered");
            }
            Ok(text)
        }
    }
}

/// Base：只输出答案（或降级摘要）
pub struct BaseGenerator;

impl ResponseGenerator for BaseGenerator {
    fn generate(
        &self,
        draft: Option<&str>,
        actions: &[Action],
        degraded: bool,
    ) -> Result<String, AgentError> {
        render_draft(draft, actions, degraded)
    }
}

/// Traced：答案后附步骤摘要，便于核对推理过程
pub struct TracedGenerator;

impl ResponseGenerator for TracedGenerator {
    fn generate(
        &self,
        draft: Option<&str>,
        actions: &[Action],
        degraded: bool,
    ) -> Result<String, AgentError> {
        let mut text = render_draft(draft, actions, degraded)?;
        if draft.is_some() && !actions.is_empty() {
            text.push_str("\n\nSteps taken:\n");
            text.push_str(&render_transcript(actions));
        }
        Ok(text)
    }
}
