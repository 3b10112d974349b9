//! 分支树搜索规划器
//!
//! 维护一组部分推理分支（候选 Action 前缀 + 启发式分数）。每轮：给未评分的
//! 分支打分（LLM 评分，解析不出数字记 0）、按分数剪枝到束宽（同分取最早
//! 发现的分支，排序稳定可复现）、对保留分支各提出若干候选下一步。候选由
//! 编排器并行执行，结果按分支 id 顺序回灌。任一分支得到最终答案即停止；
//! 扩展预算耗尽时用最优分支强制收尾。单个候选解析失败只丢弃该候选，不
//! 中止整轮。

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Action, AgentError};
use crate::llm::{LlmClient, Message};
use crate::planner::{
    build_user_prompt, parse_decision, render_task_list, render_transcript, ActionProposal,
    Observation, ParsedStep, Planner, PlannerDecision, PlannerSettings, TurnContext,
    DECISION_CONTRACT,
};

/// 一条推理分支：Action 前缀 + 分数 + 可能的最终答案
#[derive(Debug, Clone)]
struct Branch {
    id: u64,
    actions: Vec<Action>,
    score: f64,
    /// false 表示有新结果待评分
    scored: bool,
    answer: Option<String>,
}

pub struct TreePlanner {
    llm: Arc<dyn LlmClient>,
    settings: PlannerSettings,
    branches: Vec<Branch>,
    expansions_used: usize,
    next_branch_id: u64,
    /// 胜出分支 id（Finish 后供 best_transcript 使用）
    winner: Option<u64>,
}

impl TreePlanner {
    pub fn new(llm: Arc<dyn LlmClient>, settings: PlannerSettings) -> Self {
        Self {
            llm,
            settings,
            branches: Vec::new(),
            expansions_used: 0,
            next_branch_id: 0,
            winner: None,
        }
    }

    fn alloc_branch_id(&mut self) -> u64 {
        let id = self.next_branch_id;
        self.next_branch_id += 1;
        id
    }

    /// 分数降序、同分 id 升序（最早发现的分支优先）
    fn rank(a: &Branch, b: &Branch) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    }

    /// 给有新结果的分支打分；LLM 失败或非数字回复记 0 分
    async fn score_pending(&mut self, ctx: &TurnContext<'_>) {
        for branch in self.branches.iter_mut().filter(|b| !b.scored) {
            let prompt = format!(
                "The user asked: {}\n\nA candidate line of work so far:\n{}\n\n\
                 Rate how promising this line is for answering the user, \
                 on a scale from 0 to 10. Reply with just the number.",
                ctx.query,
                render_transcript(&branch.actions),
            );
            let score = match self.llm.complete(&[Message::user(prompt)]).await {
                Ok(reply) => parse_score(&reply).unwrap_or(0.0),
                Err(e) => {
                    tracing::warn!(branch = branch.id, error = %e, "branch scoring failed");
                    0.0
                }
            };
            branch.score = score;
            branch.scored = true;
        }
    }

    /// 在给定集合里选最优（分数降序、同分最早 id）
    fn pick_best(branches: &[Branch]) -> Option<&Branch> {
        branches.iter().min_by(|a, b| Self::rank(a, b))
    }

    /// 预算耗尽时的强制收尾文本
    fn forced_final(&self, ctx: &TurnContext<'_>) -> (u64, String) {
        let best = Self::pick_best(&self.branches).expect("at least the root branch exists");
        let mut text = format!(
            "I exhausted the exploration budget before reaching a confident answer to: {}",
            ctx.query
        );
        if !best.actions.is_empty() {
            text.push_str("\n\nMost promising line of work:\n");
            text.push_str(&render_transcript(&best.actions));
        }
        (best.id, text)
    }
}

#[async_trait]
impl Planner for TreePlanner {
    async fn step(&mut self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AgentError> {
        if self.branches.is_empty() {
            let id = self.alloc_branch_id();
            self.branches.push(Branch {
                id,
                actions: Vec::new(),
                score: 0.0,
                scored: true,
                answer: None,
            });
        }

        self.score_pending(ctx).await;

        // 上一轮遗留的已答分支（正常情况下当轮就返回了）
        let answered: Vec<Branch> = self
            .branches
            .iter()
            .filter(|b| b.answer.is_some())
            .cloned()
            .collect();
        if let Some(best) = Self::pick_best(&answered) {
            self.winner = Some(best.id);
            return Ok(PlannerDecision::Finish(
                best.answer.clone().expect("answered branch"),
            ));
        }

        self.branches.sort_by(Self::rank);
        self.branches.truncate(self.settings.beam_width);

        if self.expansions_used >= self.settings.max_expansions {
            let (winner, text) = self.forced_final(ctx);
            self.winner = Some(winner);
            return Ok(PlannerDecision::Finish(text));
        }

        let system = format!(
            "{DECISION_CONTRACT}\n\nAvailable tasks:\n{}",
            render_task_list(ctx.tasks)
        );

        let parents = std::mem::take(&mut self.branches);
        let mut next_branches = Vec::new();
        let mut proposals = Vec::new();

        for parent in parents {
            let mut children = Vec::new();
            for candidate in 0..self.settings.candidates_per_branch {
                self.expansions_used += 1;
                let user = format!(
                    "{}\n\nThis is exploratory candidate {} of {}; propose a distinct next step.",
                    build_user_prompt(ctx, &parent.actions),
                    candidate + 1,
                    self.settings.candidates_per_branch,
                );
                let output = match self
                    .llm
                    .complete(&[Message::system(system.clone()), Message::user(user)])
                    .await
                {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(branch = parent.id, error = %e, "candidate expansion failed");
                        continue;
                    }
                };
                match parse_decision(&output, ctx.tasks) {
                    Ok(ParsedStep::Final(answer)) => {
                        let id = self.alloc_branch_id();
                        children.push(Branch {
                            id,
                            actions: parent.actions.clone(),
                            score: parent.score,
                            scored: true,
                            answer: Some(answer),
                        });
                    }
                    Ok(ParsedStep::Invoke { task, args, rationale }) => {
                        let id = self.alloc_branch_id();
                        children.push(Branch {
                            id,
                            actions: parent.actions.clone(),
                            score: parent.score,
                            scored: true,
                            answer: None,
                        });
                        proposals.push(ActionProposal { id, task, args, rationale });
                    }
                    Err(e) => {
                        tracing::warn!(branch = parent.id, error = %e, "candidate parse failed");
                    }
                }
            }
            if children.is_empty() {
                // 所有候选都失败，保留父分支下轮再试
                next_branches.push(parent);
            } else {
                next_branches.extend(children);
            }
        }
        self.branches = next_branches;

        let answered: Vec<Branch> = self
            .branches
            .iter()
            .filter(|b| b.answer.is_some())
            .cloned()
            .collect();
        if let Some(best) = Self::pick_best(&answered) {
            self.winner = Some(best.id);
            return Ok(PlannerDecision::Finish(
                best.answer.clone().expect("answered branch"),
            ));
        }

        Ok(PlannerDecision::Act(proposals))
    }

    fn observe(&mut self, observations: &[Observation]) {
        for obs in observations {
            if let Some(branch) = self.branches.iter_mut().find(|b| b.id == obs.proposal_id) {
                branch.actions.push(obs.action.clone());
                if obs.action.outcome.is_success() {
                    branch.scored = false;
                } else {
                    // 失败分支直接记 0 分，不再花评分调用
                    branch.score = 0.0;
                    branch.scored = true;
                }
            }
        }
    }

    fn best_transcript(&self) -> Option<Vec<Action>> {
        let branch = match self.winner {
            Some(id) => self.branches.iter().find(|b| b.id == id),
            None => Self::pick_best(&self.branches),
        }?;
        Some(branch.actions.clone())
    }
}

/// 从自由文本里取第一个数字作为分数
fn parse_score(text: &str) -> Option<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .filter(|s| !s.is_empty())
        .find_map(|s| s.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionOutcome;
    use crate::llm::ScriptedLlm;

    fn settings(beam: usize, candidates: usize, budget: usize) -> PlannerSettings {
        PlannerSettings {
            parse_retries: 0,
            beam_width: beam,
            candidates_per_branch: candidates,
            max_expansions: budget,
        }
    }

    fn tasks() -> Vec<(String, String)> {
        vec![("echo".to_string(), "echo".to_string())]
    }

    fn ctx<'a>(tasks: &'a [(String, String)]) -> TurnContext<'a> {
        TurnContext {
            query: "q",
            history: "",
            tasks,
            previous_actions: &[],
            meta: &[],
        }
    }

    fn succeed(planner: &mut TreePlanner, proposals: &[ActionProposal]) {
        let observations: Vec<Observation> = proposals
            .iter()
            .map(|p| Observation {
                proposal_id: p.id,
                action: Action::new(
                    p.task.clone(),
                    p.args.clone(),
                    ActionOutcome::Success(
                        p.args.get("text").and_then(|v| v.as_str()).unwrap_or("ok").to_string(),
                    ),
                    None,
                ),
            })
            .collect();
        planner.observe(&observations);
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("7"), Some(7.0));
        assert_eq!(parse_score("Score: 8.5/10"), Some(8.5));
        assert_eq!(parse_score("no idea"), None);
    }

    #[tokio::test]
    async fn test_single_beam_reaches_answer() {
        let llm = Arc::new(ScriptedLlm::new([
            // 第 1 轮：扩展根分支
            r#"{"task": "echo", "args": {"text": "probe"}}"#,
            // 第 2 轮：评分 + 扩展
            "7",
            r#"{"final": "done"}"#,
        ]));
        let mut planner = TreePlanner::new(llm, settings(1, 1, 10));
        let tasks = tasks();

        let first = planner.step(&ctx(&tasks)).await.unwrap();
        let proposals = match first {
            PlannerDecision::Act(p) => p,
            other => panic!("expected Act, got {other:?}"),
        };
        assert_eq!(proposals.len(), 1);
        succeed(&mut planner, &proposals);

        let second = planner.step(&ctx(&tasks)).await.unwrap();
        assert!(matches!(second, PlannerDecision::Finish(t) if t == "done"));
        let transcript = planner.best_transcript().unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].task, "echo");
    }

    #[tokio::test]
    async fn test_higher_score_wins() {
        let llm = Arc::new(ScriptedLlm::new([
            // 第 1 轮：根分支扩出两个候选
            r#"{"task": "echo", "args": {"text": "path-one"}}"#,
            r#"{"task": "echo", "args": {"text": "path-two"}}"#,
            // 第 2 轮：分支 1 得 3 分、分支 2 得 8 分；剪枝后按分数排序，分支 2 先扩展
            "3",
            "8",
            r#"{"final": "ANSWER-B"}"#,
            r#"{"final": "ANSWER-A"}"#,
        ]));
        let mut planner = TreePlanner::new(llm, settings(2, 2, 20));
        let tasks = tasks();

        // 第 2 轮高分支先扩展，两个 final 都落在它名下；
        // 低分支扩展时脚本已耗尽，候选失败但不影响本轮。
        let first = planner.step(&ctx(&tasks)).await.unwrap();
        let proposals = match first {
            PlannerDecision::Act(p) => p,
            other => panic!("expected Act, got {other:?}"),
        };
        assert_eq!(proposals.len(), 2);
        succeed(&mut planner, &proposals);

        let second = planner.step(&ctx(&tasks)).await.unwrap();
        match second {
            PlannerDecision::Finish(t) => assert_eq!(t, "ANSWER-B"),
            other => panic!("expected Finish, got {other:?}"),
        }
        let transcript = planner.best_transcript().unwrap();
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].summary().contains("path-two"));
    }

    #[tokio::test]
    async fn test_tied_scores_prefer_earliest_branch() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"task": "echo", "args": {"text": "path-one"}}"#,
            r#"{"task": "echo", "args": {"text": "path-two"}}"#,
            "5",
            "5",
            r#"{"final": "ANSWER-A"}"#,
            r#"{"final": "ANSWER-B"}"#,
        ]));
        let mut planner = TreePlanner::new(llm, settings(2, 2, 20));
        let tasks = tasks();

        let first = planner.step(&ctx(&tasks)).await.unwrap();
        let proposals = match first {
            PlannerDecision::Act(p) => p,
            other => panic!("expected Act, got {other:?}"),
        };
        succeed(&mut planner, &proposals);

        let second = planner.step(&ctx(&tasks)).await.unwrap();
        match second {
            PlannerDecision::Finish(t) => assert_eq!(t, "ANSWER-A"),
            other => panic!("expected Finish, got {other:?}"),
        }
        let transcript = planner.best_transcript().unwrap();
        assert!(transcript[0].summary().contains("path-one"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_forces_finish() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"task": "echo", "args": {"text": "probe"}}"#,
            "6",
        ]));
        let mut planner = TreePlanner::new(llm, settings(1, 1, 1));
        let tasks = tasks();

        let first = planner.step(&ctx(&tasks)).await.unwrap();
        let proposals = match first {
            PlannerDecision::Act(p) => p,
            other => panic!("expected Act, got {other:?}"),
        };
        succeed(&mut planner, &proposals);

        // 预算已用完：第 2 轮评分后直接强制收尾
        let second = planner.step(&ctx(&tasks)).await.unwrap();
        match second {
            PlannerDecision::Finish(t) => assert!(t.contains("exhausted the exploration budget")),
            other => panic!("expected Finish, got {other:?}"),
        }
        assert_eq!(planner.best_transcript().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_candidate_does_not_abort_round() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"task": "echo", "args": {"text": "good"}}"#,
            "not a decision {{{",
        ]));
        let mut planner = TreePlanner::new(llm, settings(1, 2, 10));
        let tasks = tasks();

        let first = planner.step(&ctx(&tasks)).await.unwrap();
        match first {
            PlannerDecision::Act(p) => assert_eq!(p.len(), 1),
            other => panic!("expected Act, got {other:?}"),
        }
    }
}
