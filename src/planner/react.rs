//! 顺序推理-行动规划器
//!
//! 单链：观察最新任务输出（首步无），要么选一个任务+参数，要么给出最终答案。
//! 解析失败注入纠正提示重试，重试耗尽后用已有 transcript 强制收尾（可恢复，
//! 编排器仍会做尽力而为的响应生成）。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::planner::{
    build_user_prompt, parse_decision, render_task_list, render_transcript, ActionProposal,
    ParsedStep, Planner, PlannerDecision, TurnContext, DECISION_CONTRACT,
};

pub struct ReactPlanner {
    llm: Arc<dyn LlmClient>,
    parse_retries: u32,
    next_proposal_id: u64,
}

impl ReactPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, parse_retries: u32) -> Self {
        Self {
            llm,
            parse_retries,
            next_proposal_id: 0,
        }
    }

    /// 重试耗尽后的强制收尾：把最后一次原始输出与已收集的步骤摘要拼成答案
    fn forced_final(ctx: &TurnContext<'_>, last_raw: &str) -> String {
        let mut text =
            String::from("I could not settle on a structured final answer. Here is what I have:");
        if !last_raw.trim().is_empty() {
            text.push_str("\n\n");
            text.push_str(last_raw.trim());
        }
        if !ctx.previous_actions.is_empty() {
            text.push_str("\n\nSteps taken:\n");
            text.push_str(&render_transcript(ctx.previous_actions));
        }
        text
    }
}

#[async_trait]
impl Planner for ReactPlanner {
    async fn step(&mut self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AgentError> {
        let system = format!(
            "{DECISION_CONTRACT}\n\nAvailable tasks:\n{}",
            render_task_list(ctx.tasks)
        );
        let mut messages = vec![
            Message::system(system),
            Message::user(build_user_prompt(ctx, ctx.previous_actions)),
        ];

        let mut attempt = 0u32;
        let mut last_raw = String::new();
        loop {
            let output = match self.llm.complete(&messages).await {
                Ok(o) => o,
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "llm call failed");
                    if attempt >= self.parse_retries {
                        return Ok(PlannerDecision::Finish(Self::forced_final(ctx, &last_raw)));
                    }
                    attempt += 1;
                    continue;
                }
            };
            last_raw = output.clone();

            match parse_decision(&output, ctx.tasks) {
                Ok(ParsedStep::Final(answer)) => return Ok(PlannerDecision::Finish(answer)),
                Ok(ParsedStep::Invoke { task, args, rationale }) => {
                    let id = self.next_proposal_id;
                    self.next_proposal_id += 1;
                    return Ok(PlannerDecision::Act(vec![ActionProposal {
                        id,
                        task,
                        args,
                        rationale,
                    }]));
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "decision parse failed");
                    if attempt >= self.parse_retries {
                        return Ok(PlannerDecision::Finish(Self::forced_final(ctx, &last_raw)));
                    }
                    attempt += 1;
                    messages.push(Message::assistant(output));
                    messages.push(Message::user(format!(
                        "Your previous reply was not a valid decision ({e}). \
                         Reply with exactly one JSON object: either \
                         {{\"task\": \"<name>\", \"args\": {{...}}}} or {{\"final\": \"<answer>\"}}."
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    fn ctx<'a>(tasks: &'a [(String, String)]) -> TurnContext<'a> {
        TurnContext {
            query: "q",
            history: "",
            tasks,
            previous_actions: &[],
            meta: &[],
        }
    }

    fn tasks() -> Vec<(String, String)> {
        vec![("echo".to_string(), "echo".to_string())]
    }

    #[tokio::test]
    async fn test_final_on_first_call() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"final": "X"}"#]));
        let mut planner = ReactPlanner::new(llm.clone(), 2);
        let tasks = tasks();
        let decision = planner.step(&ctx(&tasks)).await.unwrap();
        assert!(matches!(decision, PlannerDecision::Finish(t) if t == "X"));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_parse_retry_then_success() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"task": "echo", "#,
            r#"{"final": "ok"}"#,
        ]));
        let mut planner = ReactPlanner::new(llm.clone(), 2);
        let tasks = tasks();
        let decision = planner.step(&ctx(&tasks)).await.unwrap();
        assert!(matches!(decision, PlannerDecision::Finish(t) if t == "ok"));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_forces_finish() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"broken": "#,
            r#"{"broken": "#,
        ]));
        let mut planner = ReactPlanner::new(llm.clone(), 1);
        let tasks = tasks();
        let decision = planner.step(&ctx(&tasks)).await.unwrap();
        match decision {
            PlannerDecision::Finish(t) => assert!(t.contains("could not settle")),
            other => panic!("expected forced finish, got {other:?}"),
        }
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_proposal_ids_are_monotonic() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"task": "echo", "args": {"text": "a"}}"#,
            r#"{"task": "echo", "args": {"text": "b"}}"#,
        ]));
        let mut planner = ReactPlanner::new(llm, 0);
        let tasks = tasks();
        let first = planner.step(&ctx(&tasks)).await.unwrap();
        let second = planner.step(&ctx(&tasks)).await.unwrap();
        let id = |d: &PlannerDecision| match d {
            PlannerDecision::Act(p) => p[0].id,
            _ => panic!("expected Act"),
        };
        assert!(id(&first) < id(&second));
    }
}
