//! 核心编排层：错误、Action 记录、主控循环、候选并行调度

pub mod action;
pub mod error;
pub mod orchestrator;
pub mod scheduler;

pub use action::{Action, ActionOutcome, FailureKind};
pub use error::AgentError;
pub use orchestrator::{Orchestrator, TurnRequest};
pub use scheduler::TaskScheduler;
