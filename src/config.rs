//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MAGPIE__*` 覆盖（双下划线表示嵌套，如 `MAGPIE__LLM__PROVIDER=openai`）。
//! 所有策略选择器（planner / datapipe / respond / llm）在 Orchestrator 构造时解析一次，之后不再按字符串分发。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub datapipe: DatapipeSection,
    #[serde(default)]
    pub respond: RespondSection,
    #[serde(default)]
    pub tasks: TasksSection,
}

/// [app] 段：应用名、单轮最大规划步数
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 单轮内编排循环的最大步数；耗尽视为降级完成而非错误
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    8
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / mock；无 API Key 时自动退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [planner] 段：变体选择与解析重试；tree 子段为分支搜索参数
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    /// 变体：react（顺序推理-行动）/ tree（分支树搜索）
    #[serde(default = "default_planner_variant")]
    pub variant: String,
    /// 后端输出解析失败的重试次数，超过后用已有 transcript 强制收尾
    #[serde(default = "default_parse_retries")]
    pub parse_retries: u32,
    #[serde(default)]
    pub tree: TreeSection,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            variant: default_planner_variant(),
            parse_retries: default_parse_retries(),
            tree: TreeSection::default(),
        }
    }
}

fn default_planner_variant() -> String {
    "react".to_string()
}

fn default_parse_retries() -> u32 {
    2
}

/// [planner.tree] 段：束宽、每分支候选数、总扩展预算
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSection {
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,
    #[serde(default = "default_candidates_per_branch")]
    pub candidates_per_branch: usize,
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
}

impl Default for TreeSection {
    fn default() -> Self {
        Self {
            beam_width: default_beam_width(),
            candidates_per_branch: default_candidates_per_branch(),
            max_expansions: default_max_expansions(),
        }
    }
}

fn default_beam_width() -> usize {
    3
}

fn default_candidates_per_branch() -> usize {
    2
}

fn default_max_expansions() -> usize {
    12
}

/// [datapipe] 段：记忆存储后端
#[derive(Debug, Clone, Deserialize)]
pub struct DatapipeSection {
    /// 后端：memory（进程内）
    #[serde(default = "default_datapipe_backend")]
    pub backend: String,
}

impl Default for DatapipeSection {
    fn default() -> Self {
        Self {
            backend: default_datapipe_backend(),
        }
    }
}

fn default_datapipe_backend() -> String {
    "memory".to_string()
}

/// [respond] 段：响应生成器
#[derive(Debug, Clone, Deserialize)]
pub struct RespondSection {
    /// 生成器：base（仅答案）/ traced（附步骤摘要）
    #[serde(default = "default_generator")]
    pub generator: String,
}

impl Default for RespondSection {
    fn default() -> Self {
        Self {
            generator: default_generator(),
        }
    }
}

fn default_generator() -> String {
    "base".to_string()
}

/// [tasks] 段：启用任务白名单、单次超时、并行上限
#[derive(Debug, Clone, Deserialize)]
pub struct TasksSection {
    /// 启用的任务名；未知名在构造期立即失败
    #[serde(default = "default_enabled_tasks")]
    pub enabled: Vec<String>,
    /// 单次任务调用超时（秒）
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// 分支候选并行执行上限
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tasks(),
            task_timeout_secs: default_task_timeout_secs(),
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_enabled_tasks() -> Vec<String> {
    vec!["echo".into(), "store".into(), "recall".into()]
}

fn default_task_timeout_secs() -> u64 {
    30
}

fn default_max_parallel() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            planner: PlannerSection::default(),
            datapipe: DatapipeSection::default(),
            respond: RespondSection::default(),
            tasks: TasksSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MAGPIE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MAGPIE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MAGPIE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
