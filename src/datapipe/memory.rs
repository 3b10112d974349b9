//! 进程内 Datapipe 实现
//!
//! RwLock<HashMap> 存值；key 由原子计数器 + uuid 片段拼成，并发 put 不会碰撞。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use crate::datapipe::{Datapipe, DatapipeError};

/// 进程内键值存储；条目存活至进程结束，无自动淘汰
pub struct InMemoryDatapipe {
    entries: RwLock<HashMap<String, Value>>,
    next_id: AtomicU64,
}

impl InMemoryDatapipe {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryDatapipe {
    fn default() -> Self {
        Self::new()
    }
}

impl Datapipe for InMemoryDatapipe {
    fn put(&self, value: Value) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let key = format!("dp-{id:06}-{}", &suffix[..8]);
        self.entries
            .write()
            .expect("datapipe lock poisoned")
            .insert(key.clone(), value);
        key
    }

    fn get(&self, key: &str) -> Result<Value, DatapipeError> {
        self.entries
            .read()
            .expect("datapipe lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| DatapipeError::NotFound(key.to_string()))
    }

    fn len(&self) -> usize {
        self.entries.read().expect("datapipe lock poisoned").len()
    }
}
