use crate::backoff::ReconnectPolicy;
use crate::protocol::{decode_frame, InboundEvent};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug)]
pub enum NetEvent {
    Frame(InboundEvent),
    Connected,
    Disconnected,
}

#[derive(Debug)]
pub enum NetCommand {
    SendText(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

/// 一条已经建立的底层连接
#[async_trait]
pub trait Transport: Send {
    /// 下一条文本帧；`None` 表示连接已关闭
    async fn recv(&mut self) -> Option<anyhow::Result<String>>;
    async fn send(&mut self, text: String) -> anyhow::Result<()>;
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn Transport>>;
}

/// 基于 tokio-tungstenite 的 WebSocket 连接
pub struct WsConnector {
    token: Option<String>,
}

impl WsConnector {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn Transport>> {
        let mut request = url.into_client_request()?;
        if let Some(token) = &self.token {
            request
                .headers_mut()
                .insert("Authorization", HeaderValue::from_str(&format!("Bearer {}", token))?);
        }
        let (stream, _) = connect_async(request).await?;
        Ok(Box::new(WsTransport { stream }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Option<anyhow::Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => {
                    log::warn!("Ignoring binary frame ({} bytes)", data.len());
                }
                Ok(Message::Close(frame)) => {
                    log::info!("Server closed connection: {:?}", frame);
                    return None;
                }
                // ping/pong 由 tungstenite 自己应答
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            log::debug!("Error while closing websocket: {}", e);
        }
    }
}

/// 当前连接。每次重连都会构造新的 `Connection`，旧的句柄关闭后丢弃，不会复用。
pub struct Connection {
    generation: u64,
    transport: Box<dyn Transport>,
}

impl Connection {
    fn new(generation: u64, transport: Box<dyn Transport>) -> Self {
        Self { generation, transport }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    async fn close(mut self) {
        self.transport.close().await;
        log::debug!("Connection #{} closed", self.generation);
    }
}

enum PumpExit {
    Dropped,
    Shutdown,
}

async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            // handle 已经被丢弃，同样视为关闭
            return;
        }
    }
}

/// 负责连接的整个生命周期：连接、收帧、断开、按策略重连。
pub struct NetLink {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<NetEvent>,
    rx_cmd: mpsc::Receiver<NetCommand>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
    generation: u64,
}

impl NetLink {
    pub fn spawn(
        url: String,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        tx: mpsc::Sender<NetEvent>,
    ) -> NetLinkHandle {
        let (cmd_tx, rx_cmd) = mpsc::channel(100);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let link = Self {
            url,
            connector,
            policy,
            tx,
            rx_cmd,
            state: state_tx,
            shutdown: shutdown_rx,
            generation: 0,
        };
        let task = tokio::spawn(link.run());

        NetLinkHandle {
            cmd_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn run(mut self) {
        // 连续失败次数，连接成功后清零
        let mut attempt: u32 = 0;

        loop {
            if self.shutting_down() {
                break;
            }
            self.set_state(if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            });
            log::info!("Connecting to {}...", self.url);

            let connected = tokio::select! {
                biased;
                _ = wait_shutdown(&mut self.shutdown) => break,
                result = self.connector.connect(&self.url) => result,
            };

            match connected {
                Ok(transport) => {
                    self.generation += 1;
                    let connection = Connection::new(self.generation, transport);
                    self.set_state(ConnectionState::Open);
                    log::info!("Connected! (connection #{})", connection.generation());
                    attempt = 0;

                    if !self.emit(NetEvent::Connected).await {
                        connection.close().await;
                        break;
                    }
                    match self.pump(connection).await {
                        PumpExit::Shutdown => break,
                        PumpExit::Dropped => {}
                    }
                }
                Err(e) => {
                    log::warn!("Connection attempt failed: {}", e);
                }
            }

            self.set_state(ConnectionState::Closed);
            self.discard_queued_commands();
            if !self.emit(NetEvent::Disconnected).await {
                break;
            }

            attempt = attempt.saturating_add(1);
            let delay = self.policy.delay_for(attempt);
            log::info!("Reconnecting in {}ms (attempt {})", delay.as_millis(), attempt);
            tokio::select! {
                biased;
                _ = wait_shutdown(&mut self.shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        log::info!("Net link stopped");
    }

    /// 读帧直到连接断开或者收到关闭信号
    async fn pump(&mut self, mut connection: Connection) -> PumpExit {
        enum Step {
            Frame(Option<anyhow::Result<String>>),
            Command(NetCommand),
            Shutdown,
        }

        loop {
            let step = tokio::select! {
                biased;
                _ = wait_shutdown(&mut self.shutdown) => Step::Shutdown,
                frame = connection.transport.recv() => Step::Frame(frame),
                Some(cmd) = self.rx_cmd.recv() => Step::Command(cmd),
            };

            match step {
                Step::Shutdown => {
                    connection.close().await;
                    return PumpExit::Shutdown;
                }
                Step::Frame(Some(Ok(text))) => match decode_frame(&text, Utc::now()) {
                    Ok(event) => {
                        if !self.emit(NetEvent::Frame(event)).await {
                            connection.close().await;
                            return PumpExit::Shutdown;
                        }
                    }
                    Err(e) => log::warn!("Dropping malformed frame: {}", e),
                },
                Step::Frame(Some(Err(e))) => {
                    log::warn!("Transport error on connection #{}: {}", connection.generation(), e);
                    self.set_state(ConnectionState::Closed);
                    connection.close().await;
                    return PumpExit::Dropped;
                }
                Step::Frame(None) => {
                    log::info!("Connection #{} closed by peer", connection.generation());
                    self.set_state(ConnectionState::Closed);
                    connection.close().await;
                    return PumpExit::Dropped;
                }
                Step::Command(NetCommand::SendText(text)) => {
                    if let Err(e) = connection.transport.send(text).await {
                        log::warn!("Send failed on connection #{}: {}", connection.generation(), e);
                        self.set_state(ConnectionState::Closed);
                        connection.close().await;
                        return PumpExit::Dropped;
                    }
                }
            }
        }
    }

    /// 把事件交给主循环。关闭信号优先，返回 false 表示不再继续
    async fn emit(&mut self, event: NetEvent) -> bool {
        tokio::select! {
            biased;
            _ = wait_shutdown(&mut self.shutdown) => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    // 断线期间排队的发送不会带到下一条连接上
    fn discard_queued_commands(&mut self) {
        let mut dropped = 0;
        while self.rx_cmd.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            log::warn!("Discarded {} outbound message(s) queued while disconnected", dropped);
        }
    }
}

/// 主循环持有的句柄
pub struct NetLinkHandle {
    cmd_tx: mpsc::Sender<NetCommand>,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl NetLinkHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// 只有连接处于 Open 时才发送，否则记录日志后丢弃
    pub fn send(&self, text: String) -> bool {
        if !self.is_connected() || self.task.is_none() {
            log::warn!("Cannot send while connection is {:?}", self.state());
            return false;
        }
        match self.cmd_tx.try_send(NetCommand::SendText(text)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to queue outbound message: {}", e);
                false
            }
        }
    }

    /// 取消等待中的重连并关闭当前连接。返回之后不会再有任何事件发出
    pub async fn teardown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(e) = task.await {
            log::error!("Net link task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 由测试喂帧的连接。发 `None` 或者丢弃 sender 表示对端关闭
    pub struct ScriptedTransport {
        frames: mpsc::UnboundedReceiver<Option<String>>,
        pub sent: Arc<Mutex<Vec<String>>>,
        pub closed: Arc<AtomicBool>,
        close_delay: Duration,
    }

    pub struct TransportControl {
        pub frames: mpsc::UnboundedSender<Option<String>>,
        pub sent: Arc<Mutex<Vec<String>>>,
        pub closed: Arc<AtomicBool>,
    }

    pub fn scripted() -> (ScriptedTransport, TransportControl) {
        scripted_with_close_delay(Duration::ZERO)
    }

    /// 关闭握手要花 `close_delay` 才完成的连接
    pub fn scripted_with_close_delay(close_delay: Duration) -> (ScriptedTransport, TransportControl) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            ScriptedTransport {
                frames: rx,
                sent: sent.clone(),
                closed: closed.clone(),
                close_delay,
            },
            TransportControl { frames: tx, sent, closed },
        )
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn recv(&mut self) -> Option<anyhow::Result<String>> {
            match self.frames.recv().await {
                Some(Some(text)) => Some(Ok(text)),
                _ => None,
            }
        }

        async fn send(&mut self, text: String) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        async fn close(&mut self) {
            if !self.close_delay.is_zero() {
                tokio::time::sleep(self.close_delay).await;
            }
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// 按顺序交出预先准备好的连接结果，用完之后的连接尝试永远挂起
    #[derive(Default)]
    pub struct ScriptedConnector {
        pub attempts: AtomicUsize,
        queue: Mutex<VecDeque<anyhow::Result<ScriptedTransport>>>,
    }

    impl ScriptedConnector {
        pub fn push(&self, outcome: anyhow::Result<ScriptedTransport>) {
            self.queue.lock().unwrap().push_back(outcome);
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> anyhow::Result<Box<dyn Transport>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some(Ok(transport)) => Ok(Box::new(transport)),
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{scripted, scripted_with_close_delay, ScriptedConnector};
    use super::*;
    use crate::protocol::fixtures::sentiment_frame;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn spawn_link(connector: Arc<ScriptedConnector>) -> (NetLinkHandle, mpsc::Receiver<NetEvent>) {
        let (tx, rx) = mpsc::channel(32);
        let handle = NetLink::spawn(
            "ws://localhost:8000/ws".to_string(),
            connector,
            ReconnectPolicy::fixed(Duration::from_millis(2000)),
            tx,
        );
        (handle, rx)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_forwarded_in_order() {
        let connector = Arc::new(ScriptedConnector::default());
        let (transport, control) = scripted();
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        assert!(handle.is_connected());
        for id in 1..=3 {
            control.frames.send(Some(sentiment_frame(id))).unwrap();
        }
        for id in 1..=3 {
            match rx.recv().await {
                Some(NetEvent::Frame(event)) => assert_eq!(event.identity.as_str(), format!("sentiment:{}", id)),
                other => panic!("unexpected event {:?}", other),
            }
        }
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped() {
        let connector = Arc::new(ScriptedConnector::default());
        let (transport, control) = scripted();
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        control.frames.send(Some("{not json".to_string())).unwrap();
        control.frames.send(Some(r#"{"type":"alert","data":{"id":1}}"#.to_string())).unwrap();
        control.frames.send(Some(sentiment_frame(5))).unwrap();

        match rx.recv().await {
            Some(NetEvent::Frame(event)) => assert_eq!(event.identity.as_str(), "sentiment:5"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(handle.is_connected());
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_once_after_fixed_delay() {
        let connector = Arc::new(ScriptedConnector::default());
        let (transport, control) = scripted();
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector.clone());

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        assert_eq!(connector.attempts(), 1);

        control.frames.send(None).unwrap();
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(!handle.is_connected());
        assert_eq!(handle.state(), ConnectionState::Closed);

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(handle.state(), ConnectionState::Reconnecting);

        // 新的连接尝试一直挂起，不会再排第二次重连
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(connector.attempts(), 2);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_keep_retrying() {
        let connector = Arc::new(ScriptedConnector::default());
        connector.push(Err(anyhow::anyhow!("connection refused")));
        connector.push(Err(anyhow::anyhow!("connection refused")));
        let (transport, _control) = scripted();
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector.clone());

        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        assert_eq!(connector.attempts(), 3);
        assert!(handle.is_connected());
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_requires_open_connection() {
        let connector = Arc::new(ScriptedConnector::default());
        let (transport, control) = scripted();
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(!handle.send("early".to_string()));
        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        assert!(handle.send(r#"{"type":"ping"}"#.to_string()));
        settle().await;
        assert_eq!(control.sent.lock().unwrap().as_slice(), [r#"{"type":"ping"}"#.to_string()]);

        control.frames.send(None).unwrap();
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(!handle.send("late".to_string()));
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_closes_transport_and_silences_events() {
        let connector = Arc::new(ScriptedConnector::default());
        let (transport, control) = scripted();
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        handle.teardown().await;
        assert!(control.closed.load(Ordering::SeqCst));
        assert_eq!(handle.state(), ConnectionState::Closed);

        // 对端在 teardown 之后还在推送
        let _ = control.frames.send(Some(sentiment_frame(1)));
        assert!(rx.recv().await.is_none());
        assert!(!handle.send("after".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        connector.push(Err(anyhow::anyhow!("connection refused")));
        let (mut handle, mut rx) = spawn_link(connector.clone());

        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        handle.teardown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn each_reconnect_gets_a_fresh_connection() {
        let connector = Arc::new(ScriptedConnector::default());
        let (first, first_control) = scripted();
        let (second, second_control) = scripted();
        connector.push(Ok(first));
        connector.push(Ok(second));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        first_control.frames.send(None).unwrap();
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));

        // 旧连接上的帧不会再被读到
        let _ = first_control.frames.send(Some(sentiment_frame(1)));
        second_control.frames.send(Some(sentiment_frame(2))).unwrap();
        match rx.recv().await {
            Some(NetEvent::Frame(event)) => assert_eq!(event.identity.as_str(), "sentiment:2"),
            other => panic!("unexpected event {:?}", other),
        }
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_restarts_after_successful_open() {
        let connector = Arc::new(ScriptedConnector::default());
        connector.push(Err(anyhow::anyhow!("connection refused")));
        connector.push(Err(anyhow::anyhow!("connection refused")));
        let (transport, control) = scripted();
        connector.push(Ok(transport));

        let (tx, mut rx) = mpsc::channel(32);
        let started = tokio::time::Instant::now();
        let mut handle = NetLink::spawn(
            "ws://localhost:8000/ws".to_string(),
            connector.clone(),
            ReconnectPolicy::from_parts("exponential", 1000, 8000, 0).unwrap(),
            tx,
        );

        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        // 两次失败分别等了 1000ms 和 2000ms
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(3100));
        assert_eq!(connector.attempts(), 3);

        control.frames.send(None).unwrap();
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));

        // 成功连上之后计数清零，下一次又从 initial 开始
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(connector.attempts(), 3);
        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(connector.attempts(), 4);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sends_queued_across_a_drop_are_discarded() {
        let connector = Arc::new(ScriptedConnector::default());
        let (first, first_control) = scripted();
        let (second, second_control) = scripted();
        connector.push(Ok(first));
        connector.push(Ok(second));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        // 排队的消息还没被读到，连接就断了
        assert!(handle.send("stale".to_string()));
        first_control.frames.send(None).unwrap();
        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));

        assert!(handle.send("fresh".to_string()));
        settle().await;
        assert!(first_control.sent.lock().unwrap().is_empty());
        assert_eq!(second_control.sent.lock().unwrap().as_slice(), ["fresh".to_string()]);
        handle.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn drop_is_visible_before_close_finishes() {
        let connector = Arc::new(ScriptedConnector::default());
        let (transport, control) = scripted_with_close_delay(Duration::from_secs(5));
        connector.push(Ok(transport));
        let (mut handle, mut rx) = spawn_link(connector);

        assert!(matches!(rx.recv().await, Some(NetEvent::Connected)));
        control.frames.send(None).unwrap();
        settle().await;

        // 关闭握手还没完成，但已经不算连接着
        assert!(!control.closed.load(Ordering::SeqCst));
        assert!(!handle.is_connected());
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert!(!handle.send("during close".to_string()));
        assert!(rx.try_recv().is_err());

        assert!(matches!(rx.recv().await, Some(NetEvent::Disconnected)));
        assert!(control.closed.load(Ordering::SeqCst));
        handle.teardown().await;
    }
}
