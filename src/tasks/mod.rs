//! 任务层：能力接口、注册表（构造期白名单）、执行器与内置任务

pub mod echo;
pub mod executor;
pub mod recall;
pub mod registry;
pub mod store;

pub use echo::EchoTask;
pub use executor::TaskExecutor;
pub use recall::RecallTask;
pub use registry::{Task, TaskInput, TaskKind, TaskRegistry};
pub use store::StoreTask;
