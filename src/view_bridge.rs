use crate::config::Config;
use crate::protocol::{Alert, SentimentRecord, Stats};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// 推给渲染进程的看板更新
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewUpdate {
    Snapshot {
        sentiments: Vec<SentimentRecord>,
        alerts: Vec<Alert>,
        stats: Option<Stats>,
    },
    Sentiment { data: SentimentRecord },
    Alert { data: Alert },
    AlertResolved { id: i64 },
    Stats { data: Stats },
    Connection { connected: bool },
    Error { message: String },
}

/// 渲染进程发回来的操作
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewCommand {
    ResolveAlert { id: i64 },
    TriggerCrisis,
    TestVoice,
    SetVerbose { verbose: bool },
    Send { message: Value },
}

#[async_trait]
pub trait ViewSink: Send + Sync {
    async fn publish(&self, update: &ViewUpdate) -> anyhow::Result<()>;
}

pub struct ViewBridge {
    socket: Arc<UdpSocket>,
    target_addr: String,
    buffer_size: usize,
    tx: mpsc::Sender<ViewCommand>,
}

// 渲染进程和本进程通过本地UDP通信，端口在配置中指定
impl ViewBridge {
    pub async fn new(config: &Config, tx: mpsc::Sender<ViewCommand>) -> anyhow::Result<Self> {
        Self::bind(
            &format!("0.0.0.0:{}", config.dashboard_local_port),
            format!("127.0.0.1:{}", config.dashboard_remote_port),
            config.dashboard_buffer_size,
            tx,
        )
        .await
    }

    pub async fn bind(
        local_addr: &str,
        target_addr: String,
        buffer_size: usize,
        tx: mpsc::Sender<ViewCommand>,
    ) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            target_addr,
            buffer_size,
            tx,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let (len, _) = self.socket.recv_from(&mut buf).await?;
            if len == 0 {
                continue;
            }
            let Ok(text) = std::str::from_utf8(&buf[..len]) else {
                log::warn!("Dropping non UTF-8 datagram from dashboard");
                continue;
            };
            match serde_json::from_str::<ViewCommand>(text) {
                Ok(cmd) => {
                    if let Err(e) = self.tx.send(cmd).await {
                        log::error!("Failed to forward dashboard command: {}", e);
                        break;
                    }
                }
                Err(e) => log::warn!("Unknown dashboard command {}: {}", text, e),
            }
        }
        Ok(())
    }

    pub async fn send_message(&self, msg: &str) -> anyhow::Result<()> {
        self.socket
            .send_to(msg.as_bytes(), &self.target_addr)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ViewSink for ViewBridge {
    async fn publish(&self, update: &ViewUpdate) -> anyhow::Result<()> {
        let text = serde_json::to_string(update)?;
        self.send_message(&text).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingView {
        pub updates: Mutex<Vec<ViewUpdate>>,
    }

    impl RecordingView {
        pub fn types(&self) -> Vec<String> {
            self.updates
                .lock()
                .unwrap()
                .iter()
                .map(|u| {
                    serde_json::to_value(u).unwrap()["type"]
                        .as_str()
                        .unwrap()
                        .to_string()
                })
                .collect()
        }
    }

    #[async_trait]
    impl ViewSink for RecordingView {
        async fn publish(&self, update: &ViewUpdate) -> anyhow::Result<()> {
            self.updates.lock().unwrap().push(update.clone());
            Ok(())
        }
    }
}
