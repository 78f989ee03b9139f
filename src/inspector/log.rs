use std::collections::VecDeque;

use crate::capture::CapturedRequest;
use crate::config::DEFAULT_MAX_REQUESTS;

/// 有界请求日志，最新的在前
///
/// 新批次整体插入到最前面（批次内部顺序不变）；超出容量时从末尾丢弃最旧的记录。
/// 记录只追加、只淘汰，不会被原地修改。
#[derive(Debug, Clone)]
pub struct RequestLog {
    entries: VecDeque<CapturedRequest>,
    capacity: usize,
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_REQUESTS)
    }
}

impl RequestLog {
    /// 容量至少为 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 插入一批记录，返回被淘汰的数量
    pub fn prepend_batch(&mut self, batch: Vec<CapturedRequest>) -> usize {
        for record in batch.into_iter().rev() {
            self.entries.push_front(record);
        }
        let evicted = self.entries.len().saturating_sub(self.capacity);
        self.entries.truncate(self.capacity);
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedRequest> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&CapturedRequest> {
        self.entries.iter().find(|r| r.id == id)
    }
}
