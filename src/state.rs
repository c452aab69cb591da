use crate::protocol::{Alert, SentimentRecord, Stats};
use chrono::Utc;
use std::collections::VecDeque;

pub const FEED_CAPACITY: usize = 100;

/// 客户端持有的看板状态。
///
/// 情绪流和告警列表都是新的在前。合并只决定插入位置和淘汰，
/// 已合并条目之间的相对顺序永远不变。
#[derive(Debug, Default)]
pub struct StateMerger {
    feed: VecDeque<SentimentRecord>,
    alerts: VecDeque<Alert>,
    stats: Option<Stats>,
    stats_stale: bool,
}

impl StateMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用启动快照整体替换状态，快照本身就是新的在前
    pub fn load_snapshot(&mut self, sentiments: Vec<SentimentRecord>, alerts: Vec<Alert>, stats: Stats) {
        self.feed = sentiments.into_iter().take(FEED_CAPACITY).collect();
        self.alerts = alerts.into_iter().collect();
        self.stats = Some(stats);
        self.stats_stale = false;
    }

    pub fn merge_sentiment(&mut self, record: SentimentRecord) {
        self.feed.push_front(record);
        self.feed.truncate(FEED_CAPACITY);
        // 统计不做增量，等待下一次刷新
        self.stats_stale = true;
    }

    pub fn merge_alert(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
    }

    /// 把告警标记为已处理。未知 id 或已处理的告警直接忽略，返回是否发生了变化
    pub fn resolve(&mut self, alert_id: i64) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) if !alert.is_resolved => {
                alert.is_resolved = true;
                if alert.resolved_at.is_none() {
                    alert.resolved_at = Some(Utc::now().to_rfc3339());
                }
                true
            }
            _ => false,
        }
    }

    pub fn replace_stats(&mut self, stats: Stats) {
        self.stats = Some(stats);
        self.stats_stale = false;
    }

    pub fn feed(&self) -> impl Iterator<Item = &SentimentRecord> {
        self.feed.iter()
    }

    pub fn feed_len(&self) -> usize {
        self.feed.len()
    }

    #[cfg(test)]
    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn unresolved_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.is_resolved)
    }

    pub fn alert(&self, alert_id: i64) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == alert_id)
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn stats_stale(&self) -> bool {
        self.stats_stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::fixtures::{alert, sentiment};

    #[test]
    fn feed_keeps_latest_hundred_newest_first() {
        let mut state = StateMerger::new();
        for id in 1..=150 {
            state.merge_sentiment(sentiment(id));
            assert!(state.feed_len() <= FEED_CAPACITY);
        }
        let ids: Vec<i64> = state.feed().map(|r| r.id).collect();
        assert_eq!(ids, (51..=150).rev().collect::<Vec<_>>());
    }

    #[test]
    fn alerts_are_unbounded_and_newest_first() {
        let mut state = StateMerger::new();
        for id in 1..=250 {
            state.merge_alert(alert(id, "low"));
        }
        assert_eq!(state.alert_count(), 250);
        assert_eq!(state.alerts().next().map(|a| a.id), Some(250));
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut state = StateMerger::new();
        state.merge_alert(alert(42, "high"));
        assert!(state.resolve(42));
        let stamped = state.alert(42).unwrap().resolved_at.clone();
        assert!(stamped.is_some());

        assert!(!state.resolve(42));
        let after = state.alert(42).unwrap();
        assert!(after.is_resolved);
        assert_eq!(after.resolved_at, stamped);
    }

    #[test]
    fn resolving_unknown_alert_is_a_no_op() {
        let mut state = StateMerger::new();
        state.merge_alert(alert(1, "low"));
        let before: Vec<Alert> = state.alerts().cloned().collect();
        assert!(!state.resolve(42));
        let after: Vec<Alert> = state.alerts().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn sentiment_marks_stats_stale_until_refresh() {
        let mut state = StateMerger::new();
        state.load_snapshot(vec![sentiment(1)], vec![], Stats::default());
        assert!(!state.stats_stale());
        state.merge_sentiment(sentiment(2));
        assert!(state.stats_stale());
        state.replace_stats(Stats { total: 2, ..Stats::default() });
        assert!(!state.stats_stale());
        assert_eq!(state.stats().map(|s| s.total), Some(2));
    }

    #[test]
    fn snapshot_is_truncated_to_capacity() {
        let mut state = StateMerger::new();
        let snapshot: Vec<_> = (0..120).rev().map(sentiment).collect();
        state.load_snapshot(snapshot, vec![alert(1, "low")], Stats::default());
        assert_eq!(state.feed_len(), FEED_CAPACITY);
        assert_eq!(state.feed().next().map(|r| r.id), Some(119));
    }

    #[test]
    fn unresolved_view_skips_resolved_alerts() {
        let mut state = StateMerger::new();
        state.merge_alert(alert(1, "low"));
        state.merge_alert(alert(2, "high"));
        state.resolve(1);
        let open: Vec<i64> = state.unresolved_alerts().map(|a| a.id).collect();
        assert_eq!(open, vec![2]);
    }
}
