use crate::protocol::{Alert, SentimentRecord, Stats};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid endpoint `{path}`: {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: StatusCode },
}

/// 后端 REST 接口：启动时读取一次快照，之后按需刷新统计和下发命令
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn get_sentiments(&self, limit: u32) -> Result<Vec<SentimentRecord>, SnapshotError>;
    async fn get_alerts(&self, limit: u32) -> Result<Vec<Alert>, SnapshotError>;
    async fn get_stats(&self, window_hours: u32) -> Result<Stats, SnapshotError>;
    async fn resolve_alert(&self, alert_id: i64) -> Result<(), SnapshotError>;
    async fn trigger_crisis(&self) -> Result<(), SnapshotError>;
}

pub struct SnapshotClient {
    client: Client,
    base: Url,
}

impl SnapshotClient {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(api_url)?;
        // 保证 join 时不会吃掉路径的最后一段
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SnapshotError> {
        self.base.join(path).map_err(|source| SnapshotError::Url {
            path: path.to_string(),
            source,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SnapshotError> {
        let url = self.endpoint(path)?;
        let endpoint = url.to_string();
        log::debug!("GET {}", endpoint);

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| SnapshotError::Request { endpoint: endpoint.clone(), source })?;
        if !resp.status().is_success() {
            return Err(SnapshotError::Status { endpoint, status: resp.status() });
        }
        resp.json::<T>()
            .await
            .map_err(|source| SnapshotError::Request { endpoint, source })
    }

    async fn post(&self, path: &str) -> Result<(), SnapshotError> {
        let url = self.endpoint(path)?;
        let endpoint = url.to_string();
        log::debug!("POST {}", endpoint);

        let resp = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|source| SnapshotError::Request { endpoint: endpoint.clone(), source })?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(SnapshotError::Status { endpoint, status: resp.status() })
        }
    }
}

#[async_trait]
impl SnapshotSource for SnapshotClient {
    async fn get_sentiments(&self, limit: u32) -> Result<Vec<SentimentRecord>, SnapshotError> {
        self.get_json("api/sentiments", &[("limit", limit.to_string())]).await
    }

    async fn get_alerts(&self, limit: u32) -> Result<Vec<Alert>, SnapshotError> {
        self.get_json("api/alerts", &[("limit", limit.to_string())]).await
    }

    async fn get_stats(&self, window_hours: u32) -> Result<Stats, SnapshotError> {
        self.get_json("api/stats", &[("hours", window_hours.to_string())]).await
    }

    async fn resolve_alert(&self, alert_id: i64) -> Result<(), SnapshotError> {
        self.post(&format!("api/alerts/{}/resolve", alert_id)).await
    }

    async fn trigger_crisis(&self) -> Result<(), SnapshotError> {
        self.post("api/demo/crisis").await
    }
}

#[derive(Debug, Clone)]
pub struct InitialSnapshot {
    pub sentiments: Vec<SentimentRecord>,
    pub alerts: Vec<Alert>,
    pub stats: Stats,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotLimits {
    pub sentiment_limit: u32,
    pub alert_limit: u32,
    pub stats_window_hours: u32,
}

/// 启动时并发拉取三份快照，任意一份失败整个启动失败
pub async fn load_initial(
    source: &dyn SnapshotSource,
    limits: SnapshotLimits,
) -> Result<InitialSnapshot, SnapshotError> {
    let (sentiments, alerts, stats) = tokio::try_join!(
        source.get_sentiments(limits.sentiment_limit),
        source.get_alerts(limits.alert_limit),
        source.get_stats(limits.stats_window_hours),
    )?;
    log::info!(
        "Loaded snapshot: {} sentiments, {} alerts, {} mentions in the last {}h",
        sentiments.len(),
        alerts.len(),
        stats.total,
        limits.stats_window_hours
    );
    Ok(InitialSnapshot { sentiments, alerts, stats })
}
