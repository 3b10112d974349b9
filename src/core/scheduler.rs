//! 候选并行调度：Semaphore 限制同轮候选任务的并发执行数
//!
//! 分支搜索一轮可能同时执行多个候选任务；许可数按配置上限（通常等于束宽）设定。
//! 结果的合并顺序由编排器按分支 id 保证，与完成顺序无关。

use std::sync::Arc;

use tokio::sync::Semaphore;

/// 任务并发调度器
pub struct TaskScheduler {
    permits: Arc<Semaphore>,
}

impl TaskScheduler {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// 获取一次任务执行许可
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed")
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}
