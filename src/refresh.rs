use crate::protocol::Stats;
use crate::snapshot::{SnapshotError, SnapshotSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type StatsUpdate = Result<Stats, SnapshotError>;

/// 统计刷新。同一时间最多一个请求在路上，期间的新请求合并成一次补刷。
/// 结果通过 channel 送回主循环，由主循环调用 `complete`。
pub struct StatsRefresher {
    source: Arc<dyn SnapshotSource>,
    window_hours: u32,
    tx: mpsc::Sender<StatsUpdate>,
    in_flight: Option<JoinHandle<()>>,
    pending: bool,
}

impl StatsRefresher {
    pub fn new(source: Arc<dyn SnapshotSource>, window_hours: u32, tx: mpsc::Sender<StatsUpdate>) -> Self {
        Self {
            source,
            window_hours,
            tx,
            in_flight: None,
            pending: false,
        }
    }

    pub fn request(&mut self) {
        if self.in_flight.is_some() {
            self.pending = true;
            return;
        }
        self.spawn();
    }

    /// 上一次请求的结果已经被处理，有积压时再发一次
    pub fn complete(&mut self) {
        self.in_flight = None;
        if self.pending {
            self.pending = false;
            self.spawn();
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// teardown 时调用，之后不会再有结果送回
    pub fn cancel(&mut self) {
        self.pending = false;
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn spawn(&mut self) {
        let source = self.source.clone();
        let tx = self.tx.clone();
        let window_hours = self.window_hours;
        self.in_flight = Some(tokio::spawn(async move {
            let result = source.get_stats(window_hours).await;
            if tx.send(result).await.is_err() {
                log::debug!("Stats refresh finished after the session closed");
            }
        }));
    }
}
