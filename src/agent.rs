//! 面向调用方的会话外壳
//!
//! 持有显式构造的 Orchestrator（构造一次、跑多轮）与会话级 meta 附件列表。
//! 负责把 (user, agent) 对话对渲染成历史文本块；reset 只清 Action 序列，
//! meta 与 Datapipe 内容保留（上传产物与缓存检索的寿命长于一次推理重置）。

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{Action, AgentError, Orchestrator, TurnRequest};

/// 会话外壳：Orchestrator + meta 附件
pub struct Agent {
    orchestrator: Orchestrator,
    name: String,
    meta: Vec<String>,
}

impl Agent {
    /// 构造会话；所有策略在此解析并绑定，失败则会话不被创建
    pub fn new(cfg: &AppConfig) -> Result<Self, AgentError> {
        Ok(Self {
            orchestrator: Orchestrator::initialize(cfg)?,
            name: cfg.app.name.clone().unwrap_or_else(|| "Magpie".to_string()),
            meta: Vec::new(),
        })
    }

    /// 注入 LLM 的构造入口（测试用）
    pub fn with_llm(
        llm: std::sync::Arc<dyn crate::llm::LlmClient>,
        cfg: &AppConfig,
    ) -> Result<Self, AgentError> {
        Ok(Self {
            orchestrator: Orchestrator::new(llm, cfg)?,
            name: cfg.app.name.clone().unwrap_or_else(|| "Magpie".to_string()),
            meta: Vec::new(),
        })
    }

    /// 把 (user, agent) 对话对渲染为分隔的历史文本块
    pub fn render_history(&self, chat_history: &[(String, String)]) -> String {
        chat_history
            .iter()
            .map(|(user, agent)| {
                format!(
                    "\n------------\nUser: {user}\n{}: {agent}\n------------\n",
                    self.name
                )
            })
            .collect()
    }

    /// 处理一条用户输入；use_history 决定是否把历史并入规划上下文
    pub async fn run(
        &mut self,
        query: &str,
        chat_history: &[(String, String)],
        use_history: bool,
    ) -> Result<String, AgentError> {
        self.run_with_cancel(query, chat_history, use_history, CancellationToken::new())
            .await
    }

    /// 带取消令牌的版本；取消只在规划步之间生效
    pub async fn run_with_cancel(
        &mut self,
        query: &str,
        chat_history: &[(String, String)],
        use_history: bool,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        let history = self.render_history(chat_history);
        self.orchestrator
            .run(TurnRequest {
                query,
                history: &history,
                use_history,
                meta: &self.meta,
                cancel,
            })
            .await
    }

    /// 追加一个 meta 附件句柄（只增不删）
    pub fn attach_meta(&mut self, handle: impl Into<String>) {
        self.meta.push(handle.into());
    }

    pub fn meta(&self) -> &[String] {
        &self.meta
    }

    /// 重置推理状态：仅清空 Action 序列
    pub fn reset(&mut self) {
        self.orchestrator.reset();
    }

    pub fn actions(&self) -> &[Action] {
        self.orchestrator.actions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_history_format() {
        let cfg = AppConfig::default();
        let agent = Agent::with_llm(std::sync::Arc::new(crate::llm::MockLlmClient), &cfg).unwrap();
        let history = agent.render_history(&[
            ("hi".to_string(), "hello".to_string()),
            ("more".to_string(), "sure".to_string()),
        ]);
        assert!(history.contains("User: hi"));
        assert!(history.contains("Magpie: hello"));
        assert_eq!(history.matches("------------").count(), 4);
    }

    #[test]
    fn test_meta_is_append_only() {
        let cfg = AppConfig::default();
        let mut agent =
            Agent::with_llm(std::sync::Arc::new(crate::llm::MockLlmClient), &cfg).unwrap();
        agent.attach_meta("upload-1");
        agent.attach_meta("upload-2");
        assert_eq!(agent.meta(), &["upload-1", "upload-2"]);
        agent.reset();
        assert_eq!(agent.meta().len(), 2);
    }
}
