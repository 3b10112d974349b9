//! 规划层：决策类型、后端输出解析、两种规划器变体
//!
//! 规划器消费（query + 渲染历史 + 可用任务 + 既往 Action），每步产出
//! Act（一个或多个候选动作）或 Finish（最终答案）。跨轮无状态：每轮由
//! 编排器新建实例，身份只存在于外部传入的历史与 Action 列表中。

pub mod react;
pub mod tree;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PlannerSection;
use crate::core::{Action, AgentError};
use crate::llm::LlmClient;

pub use react::ReactPlanner;
pub use tree::TreePlanner;

/// 候选动作：id 为分支序号（发现顺序单调递增），执行结果按 id 顺序合并
#[derive(Debug, Clone)]
pub struct ActionProposal {
    pub id: u64,
    pub task: String,
    pub args: Value,
    pub rationale: Option<String>,
}

/// 规划器单步决策
#[derive(Debug, Clone)]
pub enum PlannerDecision {
    /// 执行一个或多个候选任务（顺序变体恒为一个）
    Act(Vec<ActionProposal>),
    /// 最终答案，本轮循环结束
    Finish(String),
}

/// 候选执行结果，回灌给规划器
#[derive(Debug, Clone)]
pub struct Observation {
    pub proposal_id: u64,
    pub action: Action,
}

/// 一轮规划的只读上下文
#[derive(Debug)]
pub struct TurnContext<'a> {
    pub query: &'a str,
    /// 渲染好的历史文本块；use_history 未开启时为空串
    pub history: &'a str,
    /// 可用任务 (name, description)
    pub tasks: &'a [(String, String)],
    /// 本轮已记录的 Action（只读视图）
    pub previous_actions: &'a [Action],
    pub meta: &'a [String],
}

/// 规划器 trait
#[async_trait]
pub trait Planner: Send {
    async fn step(&mut self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AgentError>;

    /// 候选执行结果回灌；顺序变体无需处理
    fn observe(&mut self, _observations: &[Observation]) {}

    /// 应交给响应生成器的 Action 序列；None 表示直接用本轮全部 Action
    fn best_transcript(&self) -> Option<Vec<Action>> {
        None
    }
}

/// 规划器参数（从 [planner] 配置段取出，构造期定死）
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub parse_retries: u32,
    pub beam_width: usize,
    pub candidates_per_branch: usize,
    pub max_expansions: usize,
}

impl PlannerSettings {
    pub fn from_config(section: &PlannerSection) -> Self {
        Self {
            parse_retries: section.parse_retries,
            beam_width: section.tree.beam_width.max(1),
            candidates_per_branch: section.tree.candidates_per_branch.max(1),
            max_expansions: section.tree.max_expansions,
        }
    }
}

/// 规划器变体选择器：配置名在构造期解析一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerKind {
    React,
    Tree,
}

impl FromStr for PlannerKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "react" => Ok(PlannerKind::React),
            "tree" => Ok(PlannerKind::Tree),
            other => Err(AgentError::ConfigError(format!(
                "unknown planner variant: {other}"
            ))),
        }
    }
}

impl PlannerKind {
    /// 新建一轮用的规划器实例
    pub fn create(&self, llm: Arc<dyn LlmClient>, settings: &PlannerSettings) -> Box<dyn Planner> {
        match self {
            PlannerKind::React => Box::new(ReactPlanner::new(llm, settings.parse_retries)),
            PlannerKind::Tree => Box::new(TreePlanner::new(llm, settings.clone())),
        }
    }
}

/// 决策 JSON 的原始形态：{"task","args","rationale"} 或 {"final"}
#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    args: Option<Value>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default, rename = "final")]
    final_answer: Option<String>,
}

/// 解析出的单步
#[derive(Debug, Clone)]
pub enum ParsedStep {
    Invoke {
        task: String,
        args: Value,
        rationale: Option<String>,
    },
    Final(String),
}

/// 解析后端输出：提取 JSON 块（```json ... ``` 或括号跨度）并解析为决策
///
/// 不含 JSON 的纯文本整体视为最终答案；含 JSON 但非法、或 task 名不在启用
/// 列表中，都是 PlannerParseFailure（可恢复），未知名不会流到注册表查找。
pub fn parse_decision(
    output: &str,
    known_tasks: &[(String, String)],
) -> Result<ParsedStep, AgentError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(AgentError::PlannerParseFailure("empty output".to_string()));
    }

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        return Ok(ParsedStep::Final(trimmed.to_string()));
    };

    let raw: RawDecision = serde_json::from_str(json_str)
        .map_err(|e| AgentError::PlannerParseFailure(format!("{e}: {json_str}")))?;

    if let Some(answer) = raw.final_answer {
        return Ok(ParsedStep::Final(answer));
    }

    match raw.task {
        Some(task) if !task.is_empty() => {
            if !known_tasks.iter().any(|(name, _)| name == &task) {
                return Err(AgentError::PlannerParseFailure(format!(
                    "task '{task}' is not in the enabled task list"
                )));
            }
            Ok(ParsedStep::Invoke {
                task,
                args: raw.args.unwrap_or_else(|| serde_json::json!({})),
                rationale: raw.rationale,
            })
        }
        _ => Err(AgentError::PlannerParseFailure(format!(
            "decision has neither \"task\" nor \"final\": {json_str}"
        ))),
    }
}

/// 决策契约（system prompt 开头）
pub(crate) const DECISION_CONTRACT: &str = "\
You are a planning assistant. At each step, reply with exactly one JSON object:\n\
either {\"task\": \"<name>\", \"args\": {...}, \"rationale\": \"<why>\"} to invoke a task,\n\
or {\"final\": \"<answer>\"} when you can answer the user directly.\n\
Only use task names from the list below. Output nothing but the JSON object.";

pub(crate) fn render_task_list(tasks: &[(String, String)]) -> String {
    tasks
        .iter()
        .map(|(name, desc)| format!("- {name}: {desc}\n"))
        .collect()
}

pub(crate) fn render_transcript(actions: &[Action]) -> String {
    if actions.is_empty() {
        return "(none)".to_string();
    }
    actions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a.summary()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 组装用户侧 prompt：历史、meta、已执行步骤、当前 query
pub(crate) fn build_user_prompt(ctx: &TurnContext<'_>, actions: &[Action]) -> String {
    let mut prompt = String::new();
    if !ctx.history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(ctx.history);
        prompt.push_str("\n\n");
    }
    if !ctx.meta.is_empty() {
        prompt.push_str("Attached artifacts:\n");
        for handle in ctx.meta {
            prompt.push_str(&format!("- {handle}\n"));
        }
        prompt.push('\n');
    }
    prompt.push_str("Steps so far:\n");
    prompt.push_str(&render_transcript(actions));
    prompt.push_str("\n\nUser query: ");
    prompt.push_str(ctx.query);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks() -> Vec<(String, String)> {
        vec![
            ("echo".to_string(), "echo text".to_string()),
            ("store".to_string(), "store value".to_string()),
        ]
    }

    #[test]
    fn test_parse_invoke() {
        let step =
            parse_decision(r#"{"task": "echo", "args": {"text": "hi"}, "rationale": "r"}"#, &tasks())
                .unwrap();
        match step {
            ParsedStep::Invoke { task, args, rationale } => {
                assert_eq!(task, "echo");
                assert_eq!(args["text"], "hi");
                assert_eq!(rationale.as_deref(), Some("r"));
            }
            _ => panic!("expected Invoke"),
        }
    }

    #[test]
    fn test_parse_final() {
        let step = parse_decision(r#"{"final": "done"}"#, &tasks()).unwrap();
        assert!(matches!(step, ParsedStep::Final(t) if t == "done"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let out = "Thinking...\n```json\n{\"task\": \"echo\", \"args\": {}}\n```";
        let step = parse_decision(out, &tasks()).unwrap();
        assert!(matches!(step, ParsedStep::Invoke { task, .. } if task == "echo"));
    }

    #[test]
    fn test_plain_text_is_final() {
        let step = parse_decision("just a direct answer", &tasks()).unwrap();
        assert!(matches!(step, ParsedStep::Final(t) if t == "just a direct answer"));
    }

    #[test]
    fn test_unknown_task_is_parse_failure() {
        let err = parse_decision(r#"{"task": "hack", "args": {}}"#, &tasks()).unwrap_err();
        assert!(matches!(err, AgentError::PlannerParseFailure(_)));
    }

    #[test]
    fn test_invalid_json_is_parse_failure() {
        let err = parse_decision(r#"{"task": "echo", "#, &tasks()).unwrap_err();
        assert!(matches!(err, AgentError::PlannerParseFailure(_)));
    }

    #[test]
    fn test_empty_output_is_parse_failure() {
        assert!(parse_decision("  \n ", &tasks()).is_err());
    }
}
