//! LLM 客户端层：抽象 trait、OpenAI 兼容实现、Mock / 脚本化实现

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use mock::{MockLlmClient, ScriptedLlm};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, Message, Role};

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok();

    if provider == "mock" || !has_key {
        if provider != "mock" {
            tracing::warn!("No API key set, using Mock LLM");
        }
        return Arc::new(MockLlmClient);
    }

    tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
    Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        std::env::var("OPENAI_API_KEY").ok().as_deref(),
    ))
}
