//! 编排器：主控循环
//!
//! initialize 一次性解析所有可插拔策略（LLM 后端、规划器变体、Datapipe 后端、
//! 响应生成器、任务白名单）并绑定为一个不可变实例；之后 run 复用绑定，只有
//! previous_actions 随轮次演进。换任何策略都要求构造新实例。
//!
//! run 的循环：规划器给出决策 -> 执行任务（多候选并行、按分支 id 顺序合并）->
//! 记录 Action -> 回灌结果，直到最终答案 / 步数预算耗尽（降级完成）/ 取消。
//! 任务层失败只是数据，循环从不因此中止。

use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{Action, AgentError, TaskScheduler};
use crate::datapipe::{Datapipe, DatapipeKind};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::planner::{Observation, PlannerDecision, PlannerKind, PlannerSettings, TurnContext};
use crate::respond::{ResponseGenerator, ResponseGeneratorKind};
use crate::tasks::{TaskExecutor, TaskRegistry};

/// 一轮调用的输入
pub struct TurnRequest<'a> {
    pub query: &'a str,
    /// 渲染好的历史文本块；是否采用由 use_history 决定（调用方策略，非自动）
    pub history: &'a str,
    pub use_history: bool,
    pub meta: &'a [String],
    /// 轮内取消信号；在每步开始处检查（步间取消，不打断执行中的任务）
    pub cancel: CancellationToken,
}

/// 编排器：构造一次、跑多轮
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    planner_kind: PlannerKind,
    planner_settings: PlannerSettings,
    executor: TaskExecutor,
    datapipe: Arc<dyn Datapipe>,
    generator: Box<dyn ResponseGenerator>,
    scheduler: TaskScheduler,
    max_steps: usize,
    /// 本会话的 Action 序列；只增不减，仅 reset 可整体清空
    previous_actions: Vec<Action>,
}

impl Orchestrator {
    /// 按配置解析全部策略并构造；任何未知选择器或任务名在此立即失败
    pub fn initialize(cfg: &AppConfig) -> Result<Self, AgentError> {
        let llm = create_llm_from_config(cfg);
        Self::new(llm, cfg)
    }

    /// 注入 LLM 的构造入口（测试用脚本化客户端走这里）
    pub fn new(llm: Arc<dyn LlmClient>, cfg: &AppConfig) -> Result<Self, AgentError> {
        if cfg.app.max_steps == 0 {
            return Err(AgentError::ConfigError(
                "app.max_steps must be at least 1".to_string(),
            ));
        }
        let planner_kind = PlannerKind::from_str(&cfg.planner.variant)?;
        let datapipe = DatapipeKind::from_str(&cfg.datapipe.backend)?.create();
        let generator = ResponseGeneratorKind::from_str(&cfg.respond.generator)?.create();
        let registry = TaskRegistry::from_names(&cfg.tasks.enabled, &datapipe)?;

        Ok(Self {
            llm,
            planner_kind,
            planner_settings: PlannerSettings::from_config(&cfg.planner),
            executor: TaskExecutor::new(registry, cfg.tasks.task_timeout_secs),
            datapipe,
            generator,
            scheduler: TaskScheduler::new(cfg.tasks.max_parallel),
            max_steps: cfg.app.max_steps,
            previous_actions: Vec::new(),
        })
    }

    /// 跑一轮：query + 历史 + meta -> 响应文本
    pub async fn run(&mut self, req: TurnRequest<'_>) -> Result<String, AgentError> {
        let history = if req.use_history { req.history } else { "" };
        let tasks = self.executor.task_descriptions();
        let mut planner = self.planner_kind.create(self.llm.clone(), &self.planner_settings);
        let turn_start = self.previous_actions.len();

        let mut draft: Option<String> = None;
        let mut cancelled = false;

        for step in 0..self.max_steps {
            if req.cancel.is_cancelled() {
                tracing::info!(step, "turn cancelled between steps");
                cancelled = true;
                break;
            }

            let decision = {
                let ctx = TurnContext {
                    query: req.query,
                    history,
                    tasks: &tasks,
                    previous_actions: &self.previous_actions[turn_start..],
                    meta: req.meta,
                };
                planner.step(&ctx).await?
            };

            match decision {
                PlannerDecision::Finish(text) => {
                    tracing::debug!(step, "planner finished");
                    draft = Some(text);
                    break;
                }
                PlannerDecision::Act(mut proposals) => {
                    // 合并顺序按分支 id，与完成顺序无关，保证评分与平手可复现
                    proposals.sort_by_key(|p| p.id);
                    let futures = proposals.iter().map(|p| {
                        let executor = &self.executor;
                        let scheduler = &self.scheduler;
                        async move {
                            let _permit = scheduler.acquire().await;
                            let outcome =
                                executor.execute(&p.task, p.args.clone(), req.meta).await?;
                            Ok::<Observation, AgentError>(Observation {
                                proposal_id: p.id,
                                action: Action::new(
                                    p.task.clone(),
                                    p.args.clone(),
                                    outcome,
                                    p.rationale.clone(),
                                ),
                            })
                        }
                    });
                    let observations = join_all(futures)
                        .await
                        .into_iter()
                        .collect::<Result<Vec<_>, _>>()?;

                    for obs in &observations {
                        self.previous_actions.push(obs.action.clone());
                    }
                    planner.observe(&observations);
                }
            }
        }

        let degraded = draft.is_none();
        let mut transcript = planner
            .best_transcript()
            .unwrap_or_else(|| self.previous_actions[turn_start..].to_vec());
        if transcript.is_empty() {
            transcript = self.previous_actions[turn_start..].to_vec();
        }

        if draft.is_none() && transcript.is_empty() {
            // 一步都没跑成：取消先于任何工作，或规划器从未产出可执行候选。
            // 不变式：这种状态下绝不调用响应生成器。
            if cancelled {
                return Err(AgentError::Cancelled);
            }
            return Ok(
                "I was unable to make any progress on this request. Please try rephrasing."
                    .to_string(),
            );
        }

        if degraded {
            tracing::warn!(
                steps = self.previous_actions.len() - turn_start,
                cancelled,
                "turn ended without an explicit final answer"
            );
        }

        self.generator.generate(draft.as_deref(), &transcript, degraded)
    }

    /// 会话重置：只清空 Action 序列；meta 与 Datapipe 按设计跨重置存活
    pub fn reset(&mut self) {
        self.previous_actions.clear();
    }

    pub fn actions(&self) -> &[Action] {
        &self.previous_actions
    }

    pub fn datapipe(&self) -> Arc<dyn Datapipe> {
        self.datapipe.clone()
    }

    /// 启用任务的 schema JSON，供外部按名自省
    pub fn task_schema_json(&self) -> String {
        self.executor.task_schema_json()
    }
}
