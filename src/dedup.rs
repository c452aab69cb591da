use crate::protocol::EventIdentity;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

pub const WINDOW_CAPACITY: usize = 100;
pub const WINDOW_RETAIN: usize = 50;

/// 按插入顺序记录最近见过的标识。
///
/// 插入后长度超过 `capacity` 时，从最旧的一端淘汰，只保留最近的 `retain` 个。
/// 任何一次插入之后长度都不会超过 `capacity`。
#[derive(Debug, Clone)]
pub struct RecencyWindow<T> {
    order: VecDeque<T>,
    members: HashSet<T>,
    capacity: usize,
    retain: usize,
}

impl<T: Eq + Hash + Clone> RecencyWindow<T> {
    pub fn new() -> Self {
        Self::with_limits(WINDOW_CAPACITY, WINDOW_RETAIN)
    }

    pub fn with_limits(capacity: usize, retain: usize) -> Self {
        assert!(retain <= capacity, "retain must not exceed capacity");
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
            retain,
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    /// 已存在时返回 false 且不改变窗口
    pub fn insert(&mut self, item: T) -> bool {
        if self.contains(&item) {
            return false;
        }
        self.members.insert(item.clone());
        self.order.push_back(item);

        if self.order.len() > self.capacity {
            let evict = self.order.len() - self.retain;
            for old in self.order.drain(..evict) {
                self.members.remove(&old);
            }
            log::debug!("Recency window evicted {} entries", evict);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// 从旧到新遍历
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }
}

impl<T: Eq + Hash + Clone> Default for RecencyWindow<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 每个解码成功的帧在修改任何状态之前调用一次 `should_process`，
/// 重复投递的帧因此不会产生任何可观察的副作用。
#[derive(Debug, Default)]
pub struct Deduplicator {
    window: RecencyWindow<EventIdentity>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_process(&mut self, identity: &EventIdentity) -> bool {
        self.window.insert(identity.clone())
    }

    /// 启动快照里已有的记录预先登记，流里再次出现时直接忽略
    pub fn seed<I>(&mut self, identities: I)
    where
        I: IntoIterator<Item = EventIdentity>,
    {
        for identity in identities {
            self.window.insert(identity);
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }
}
