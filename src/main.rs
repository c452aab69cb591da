mod announce;
mod backoff;
mod commands;
mod config;
mod controller;
mod dedup;
mod net_link;
mod protocol;
mod refresh;
mod router;
mod snapshot;
mod state;
mod view_bridge;

use announce::AnnouncementGate;
use commands::{CommandOutcome, CommandRunner};
use config::Config;
use controller::CoreController;
use net_link::{NetEvent, NetLink, WsConnector};
use protocol::InboundEvent;
use refresh::{StatsRefresher, StatsUpdate};
use router::EventRouter;
use snapshot::{SnapshotClient, SnapshotLimits, SnapshotSource};
use state::StateMerger;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use view_bridge::{ViewBridge, ViewCommand};

// 所有工作都在同一个线程上协作调度
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 加载配置，运行时环境变量优先
    let mut config = Config::new().map_err(anyhow::Error::msg)?;
    config.apply_env_overrides()?;
    log::info!("{} v{} starting", config.app_name, config.app_version);

    // 创建通道，用于组件间通信
    let (tx_net_event, mut rx_net_event) = mpsc::channel::<NetEvent>(100);
    let (tx_view_cmd, mut rx_view_cmd) = mpsc::channel::<ViewCommand>(100);
    let (tx_stats, mut rx_stats) = mpsc::channel::<StatsUpdate>(16);
    let (tx_outcome, mut rx_outcome) = mpsc::channel::<CommandOutcome>(16);

    // 启动看板桥，优先启动，启动失败时也要能把错误推给看板
    let view_bridge = Arc::new(ViewBridge::new(&config, tx_view_cmd).await?);
    log::info!("Dashboard bridge listening on {}", view_bridge.local_addr()?);
    let view_bridge_clone = view_bridge.clone();
    tokio::spawn(async move {
        if let Err(e) = view_bridge_clone.run().await {
            log::error!("ViewBridge error: {}", e);
        }
    });

    // 拉取启动快照，失败则不进入看板
    let snapshot: Arc<dyn SnapshotSource> = Arc::new(SnapshotClient::new(&config.api_url)?);
    let limits = SnapshotLimits {
        sentiment_limit: config.sentiment_limit,
        alert_limit: config.alert_limit,
        stats_window_hours: config.stats_window_hours,
    };
    let initial = match controller::bootstrap(
        snapshot.as_ref(),
        limits,
        view_bridge.as_ref(),
        &config.api_url,
    )
    .await
    {
        Ok(initial) => initial,
        Err(message) => anyhow::bail!(message),
    };

    // 组装事件处理链
    let gate = AnnouncementGate::new(announce::init_announcer(&config), config.voice_verbose);
    let refresher = StatsRefresher::new(snapshot.clone(), config.stats_window_hours, tx_stats);
    let mut router = EventRouter::new(StateMerger::new(), gate, refresher);
    router.subscribe(|event: &InboundEvent| {
        log::info!("Unclassified event `{}` ({})", event.kind, event.identity);
    });

    // 启动网络链接
    let connector = Arc::new(WsConnector::new(config.ws_token.clone()));
    let net_link = NetLink::spawn(
        config.ws_url.clone(),
        connector,
        config.reconnect.clone(),
        tx_net_event,
    );

    let commands = CommandRunner::new(snapshot, tx_outcome);
    let mut controller = CoreController::new(router, net_link, commands, view_bridge.clone());
    controller.apply_snapshot(initial).await;

    let mut status_tick =
        tokio::time::interval(Duration::from_secs(config.status_interval_secs.max(1)));
    log::info!("SentiGuard client started");

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            Some(event) = rx_net_event.recv() => {
                controller.handle_net_event(event).await;
            }

            Some(update) = rx_stats.recv() => {
                controller.handle_stats_update(update).await;
            }

            Some(cmd) = rx_view_cmd.recv() => {
                controller.handle_view_command(cmd).await;
            }

            Some(outcome) = rx_outcome.recv() => {
                controller.handle_command_outcome(outcome).await;
            }

            _ = status_tick.tick() => {
                log::info!("{}", controller.status_line());
            }
        }
    }

    controller.teardown().await;
    Ok(())
}
