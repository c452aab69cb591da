use crate::commands::{BackendCommand, CommandOutcome, CommandRunner};
use crate::dedup::Deduplicator;
use crate::net_link::{NetEvent, NetLinkHandle};
use crate::protocol::{EventIdentity, EventPayload, InboundEvent, KIND_ALERT, KIND_SENTIMENT};
use crate::refresh::StatsUpdate;
use crate::router::EventRouter;
use crate::snapshot::{load_initial, InitialSnapshot, SnapshotLimits, SnapshotSource};
use crate::view_bridge::{ViewCommand, ViewSink, ViewUpdate};
use std::sync::Arc;

/// 启动时拉取快照。失败时看板进入阻塞的错误状态，不展示任何部分数据
pub async fn bootstrap(
    source: &dyn SnapshotSource,
    limits: SnapshotLimits,
    view: &dyn ViewSink,
    api_url: &str,
) -> Result<InitialSnapshot, String> {
    match load_initial(source, limits).await {
        Ok(snapshot) => Ok(snapshot),
        Err(e) => {
            log::error!("Failed to load data: {}", e);
            let message = format!(
                "Failed to load data. Make sure the backend is reachable at {}.",
                api_url
            );
            if let Err(e) = view.publish(&ViewUpdate::Error { message: message.clone() }).await {
                log::warn!("Failed to send to dashboard: {}", e);
            }
            Err(message)
        }
    }
}

pub struct CoreController {
    dedup: Deduplicator,
    router: EventRouter,
    link: NetLinkHandle,
    commands: CommandRunner,
    view: Arc<dyn ViewSink>,
    connected: bool,
    torn_down: bool,
}

impl CoreController {
    pub fn new(
        router: EventRouter,
        link: NetLinkHandle,
        commands: CommandRunner,
        view: Arc<dyn ViewSink>,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(),
            router,
            link,
            commands,
            view,
            connected: false,
            torn_down: false,
        }
    }

    /// 装入启动快照，并把其中的记录登记到去重窗口
    pub async fn apply_snapshot(&mut self, snapshot: InitialSnapshot) {
        self.dedup.seed(
            snapshot
                .sentiments
                .iter()
                .map(|r| EventIdentity::for_record(KIND_SENTIMENT, r.id))
                .chain(
                    snapshot
                        .alerts
                        .iter()
                        .map(|a| EventIdentity::for_record(KIND_ALERT, a.id)),
                ),
        );

        let update = ViewUpdate::Snapshot {
            sentiments: snapshot.sentiments.clone(),
            alerts: snapshot.alerts.clone(),
            stats: Some(snapshot.stats.clone()),
        };
        self.router
            .state_mut()
            .load_snapshot(snapshot.sentiments, snapshot.alerts, snapshot.stats);
        log::info!("Dedup window seeded with {} snapshot records", self.dedup.len());
        self.publish(&update).await;
    }

    pub async fn handle_net_event(&mut self, event: NetEvent) {
        if self.torn_down {
            return;
        }
        match event {
            NetEvent::Frame(event) => self.process_frame(event).await,
            NetEvent::Connected => {
                log::info!("WebSocket Connected");
                self.set_connected(true).await;
            }
            NetEvent::Disconnected => {
                log::info!("WebSocket Disconnected");
                self.set_connected(false).await;
            }
        }
    }

    async fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        self.publish(&ViewUpdate::Connection { connected }).await;
    }

    async fn process_frame(&mut self, event: InboundEvent) {
        if !self.dedup.should_process(&event.identity) {
            log::debug!("Skipping re-delivered event {}", event.identity);
            return;
        }

        let update = match &event.payload {
            EventPayload::Sentiment(record) => Some(ViewUpdate::Sentiment { data: record.clone() }),
            EventPayload::Alert(alert) => Some(ViewUpdate::Alert { data: alert.clone() }),
            EventPayload::Other(_) => None,
        };
        let identity = event.identity.clone();
        let (received_at, emitted_at) = (event.received_at, event.emitted_at);
        let routed = self.router.route(event).await;
        log::debug!(
            "Event {} routed: {:?} (received {}, emitted {:?})",
            identity,
            routed,
            received_at.to_rfc3339(),
            emitted_at
        );
        if let Some(update) = update {
            self.publish(&update).await;
        }
    }

    pub async fn handle_stats_update(&mut self, update: StatsUpdate) {
        if self.torn_down {
            return;
        }
        if self.router.stats_refreshed(update) {
            if let Some(stats) = self.router.state().stats().cloned() {
                self.publish(&ViewUpdate::Stats { data: stats }).await;
            }
        }
    }

    pub async fn handle_view_command(&mut self, cmd: ViewCommand) {
        if self.torn_down {
            return;
        }
        log::info!("Received command from dashboard: {:?}", cmd);
        match cmd {
            ViewCommand::ResolveAlert { id } => self.resolve_alert(id),
            ViewCommand::TriggerCrisis => self.trigger_crisis(),
            ViewCommand::TestVoice => self.router.gate_mut().test_announce().await,
            ViewCommand::SetVerbose { verbose } => self.router.gate_mut().set_verbose(verbose),
            ViewCommand::Send { message } => {
                self.link.send(message.to_string());
            }
        }
    }

    /// 请求后端处理告警，本地状态等答复回来再改
    pub fn resolve_alert(&mut self, alert_id: i64) {
        self.commands.submit(BackendCommand::ResolveAlert(alert_id));
    }

    pub fn trigger_crisis(&mut self) {
        self.commands.submit(BackendCommand::TriggerCrisis);
    }

    /// 后端答复。失败只记日志，不重试
    pub async fn handle_command_outcome(&mut self, outcome: CommandOutcome) {
        if self.torn_down {
            return;
        }
        match (outcome.command, outcome.result) {
            (BackendCommand::ResolveAlert(id), Ok(())) => {
                if self.router.state_mut().resolve(id) {
                    if let Some(alert) = self.router.state().alert(id) {
                        log::info!("Alert {} resolved: {}", id, alert.title);
                    }
                    self.publish(&ViewUpdate::AlertResolved { id }).await;
                } else {
                    log::debug!("Alert {} unknown or already resolved", id);
                }
            }
            (BackendCommand::ResolveAlert(id), Err(e)) => {
                log::warn!("Failed to resolve alert {}: {}", id, e)
            }
            (BackendCommand::TriggerCrisis, Ok(())) => log::info!("Crisis simulation triggered"),
            (BackendCommand::TriggerCrisis, Err(e)) => log::warn!("Failed to trigger crisis: {}", e),
        }
    }

    #[cfg(test)]
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn status_line(&self) -> String {
        let state = self.router.state();
        let stats = match state.stats() {
            Some(s) => format!(
                "{} mentions (+{} / ={} / -{}), avg {:.2}{}",
                s.total,
                s.positive,
                s.neutral,
                s.negative,
                s.average_score,
                if state.stats_stale() { ", refreshing" } else { "" }
            ),
            None => "no stats".to_string(),
        };
        let latest = match state.feed().next() {
            Some(r) => format!(" | latest {} {} {:+.2}", r.source, r.sentiment_label, r.sentiment_score),
            None => String::new(),
        };
        format!(
            "{} | feed {} | alerts {} ({} open) | {}{}",
            if self.is_connected() { "Live" } else { "Disconnected" },
            state.feed_len(),
            state.alert_count(),
            state.unresolved_alerts().count(),
            stats,
            latest
        )
    }

    /// 关闭连接和所有后台工作，之后到达的任何事件都会被忽略
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.link.teardown().await;
        self.commands.cancel();
        self.router.shutdown().await;
        log::info!("Session torn down");
    }

    async fn publish(&self, update: &ViewUpdate) {
        if let Err(e) = self.view.publish(update).await {
            log::warn!("Failed to send to dashboard: {}", e);
        }
    }
}
