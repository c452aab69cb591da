use crate::announce::AnnouncementGate;
use crate::protocol::{EventPayload, InboundEvent};
use crate::refresh::{StatsRefresher, StatsUpdate};
use crate::state::StateMerger;

/// 未识别类型事件的订阅者
pub trait EventListener: Send {
    fn on_event(&mut self, event: &InboundEvent);
}

impl<F> EventListener for F
where
    F: FnMut(&InboundEvent) + Send,
{
    fn on_event(&mut self, event: &InboundEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Sentiment,
    Alert { announced: bool },
    /// 透传给了多少个订阅者
    Forwarded(usize),
}

/// 按事件类型分发。调用方必须先过一遍去重，同一帧不会被分发两次。
pub struct EventRouter {
    state: StateMerger,
    gate: AnnouncementGate,
    refresher: StatsRefresher,
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventRouter {
    pub fn new(state: StateMerger, gate: AnnouncementGate, refresher: StatsRefresher) -> Self {
        Self {
            state,
            gate,
            refresher,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub async fn route(&mut self, event: InboundEvent) -> Routed {
        match event.payload {
            EventPayload::Sentiment(record) => {
                log::debug!("Merging sentiment {} from {}", record.id, record.source);
                self.state.merge_sentiment(record);
                self.refresher.request();
                Routed::Sentiment
            }
            EventPayload::Alert(alert) => {
                let (severity, alert_id) = (alert.severity.clone(), alert.id);
                log::info!("New {} alert {}: {}", severity, alert_id, alert.title);
                self.state.merge_alert(alert);
                let announced = self.gate.consider(&severity, alert_id).await;
                Routed::Alert { announced }
            }
            EventPayload::Other(_) => {
                for listener in self.listeners.iter_mut() {
                    listener.on_event(&event);
                }
                if self.listeners.is_empty() {
                    log::debug!("Ignoring unclassified event `{}`", event.kind);
                }
                Routed::Forwarded(self.listeners.len())
            }
        }
    }

    /// 统计刷新结果回来了。失败时保留旧的统计
    pub fn stats_refreshed(&mut self, update: StatsUpdate) -> bool {
        self.refresher.complete();
        match update {
            Ok(stats) => {
                self.state.replace_stats(stats);
                true
            }
            Err(e) => {
                log::warn!("Stats refresh failed, keeping previous stats: {}", e);
                false
            }
        }
    }

    pub fn state(&self) -> &StateMerger {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateMerger {
        &mut self.state
    }

    pub fn gate_mut(&mut self) -> &mut AnnouncementGate {
        &mut self.gate
    }

    /// 停掉还在路上的统计请求和正在进行的播报
    pub async fn shutdown(&mut self) {
        self.refresher.cancel();
        self.gate.silence().await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::announce::gate::testing::RecordingAnnouncer;
    use crate::snapshot::testing::FakeSnapshot;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    pub struct Harness {
        pub router: EventRouter,
        pub announcer: RecordingAnnouncer,
        pub snapshot: Arc<FakeSnapshot>,
        pub stats_rx: mpsc::Receiver<StatsUpdate>,
    }

    pub fn harness(verbose: bool) -> Harness {
        let announcer = RecordingAnnouncer::default();
        let snapshot = Arc::new(FakeSnapshot::default());
        let (stats_tx, stats_rx) = mpsc::channel(16);
        let router = EventRouter::new(
            StateMerger::new(),
            AnnouncementGate::new(Arc::new(announcer.clone()), verbose),
            StatsRefresher::new(snapshot.clone(), 24, stats_tx),
        );
        Harness { router, announcer, snapshot, stats_rx }
    }
}
