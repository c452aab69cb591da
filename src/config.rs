use crate::announce::AnnouncerKind;
use crate::backoff::ReconnectPolicy;
use anyhow::Context;
use std::env;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 网络配置，运行时可以被环境变量覆盖
    pub ws_url: String,
    pub api_url: String,
    pub ws_token: Option<String>,

    // 断线重连
    pub reconnect: ReconnectPolicy,

    // 启动快照参数
    pub sentiment_limit: u32,
    pub alert_limit: u32,
    pub stats_window_hours: u32,

    // 语音播报
    pub announcer: AnnouncerKind,
    pub voice_verbose: bool,
    pub voice_command: String,
    pub voice_args: Vec<String>,

    // Dashboard 进程配置
    pub dashboard_local_port: u16,
    pub dashboard_remote_port: u16,
    pub dashboard_buffer_size: usize,
    pub status_interval_secs: u64,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        let reconnect = ReconnectPolicy::from_parts(
            env!("RECONNECT_POLICY"),
            env!("RECONNECT_DELAY_MS").parse()
                .map_err(|_| "Failed to parse RECONNECT_DELAY_MS")?,
            env!("RECONNECT_MAX_DELAY_MS").parse()
                .map_err(|_| "Failed to parse RECONNECT_MAX_DELAY_MS")?,
            env!("RECONNECT_JITTER_MS").parse()
                .map_err(|_| "Failed to parse RECONNECT_JITTER_MS")?,
        )?;

        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            // 网络配置
            ws_url: env!("WS_URL").to_string(),
            api_url: env!("API_URL").to_string(),
            ws_token: non_empty(env!("WS_TOKEN")),

            reconnect,

            // 启动快照
            sentiment_limit: env!("SNAPSHOT_SENTIMENT_LIMIT").parse()
                .map_err(|_| "Failed to parse SNAPSHOT_SENTIMENT_LIMIT")?,
            alert_limit: env!("SNAPSHOT_ALERT_LIMIT").parse()
                .map_err(|_| "Failed to parse SNAPSHOT_ALERT_LIMIT")?,
            stats_window_hours: env!("SNAPSHOT_STATS_WINDOW_HOURS").parse()
                .map_err(|_| "Failed to parse SNAPSHOT_STATS_WINDOW_HOURS")?,

            // 语音播报
            announcer: env!("VOICE_ANNOUNCER").parse()
                .map_err(|_| "Failed to parse VOICE_ANNOUNCER")?,
            voice_verbose: env!("VOICE_VERBOSE").parse()
                .map_err(|_| "Failed to parse VOICE_VERBOSE")?,
            voice_command: env!("VOICE_COMMAND").to_string(),
            voice_args: env!("VOICE_ARGS").split_whitespace().map(str::to_string).collect(),

            // Dashboard 进程配置
            dashboard_local_port: env!("DASHBOARD_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse DASHBOARD_LOCAL_PORT")?,
            dashboard_remote_port: env!("DASHBOARD_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse DASHBOARD_REMOTE_PORT")?,
            dashboard_buffer_size: env!("DASHBOARD_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse DASHBOARD_BUFFER_SIZE")?,
            status_interval_secs: env!("DASHBOARD_STATUS_INTERVAL_SECS").parse()
                .map_err(|_| "Failed to parse DASHBOARD_STATUS_INTERVAL_SECS")?,
        })
    }

    /// 运行时用 `SENTIGUARD_*` 环境变量覆盖编译期的默认值
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = lookup("SENTIGUARD_WS_URL") {
            self.ws_url = url;
        }
        if let Some(url) = lookup("SENTIGUARD_API_URL") {
            self.api_url = url;
        }
        if let Some(token) = lookup("SENTIGUARD_WS_TOKEN") {
            self.ws_token = non_empty(&token);
        }
        if let Some(delay) = lookup("SENTIGUARD_RECONNECT_DELAY_MS") {
            let delay_ms: u64 = delay
                .parse()
                .with_context(|| format!("Invalid SENTIGUARD_RECONNECT_DELAY_MS: {}", delay))?;
            self.reconnect = match &self.reconnect {
                ReconnectPolicy::Fixed { .. } => {
                    ReconnectPolicy::fixed(std::time::Duration::from_millis(delay_ms))
                }
                ReconnectPolicy::Exponential { max, jitter, .. } => ReconnectPolicy::Exponential {
                    initial: std::time::Duration::from_millis(delay_ms),
                    max: (*max).max(std::time::Duration::from_millis(delay_ms)),
                    jitter: *jitter,
                },
            };
        }
        if let Some(verbose) = lookup("SENTIGUARD_VOICE_VERBOSE") {
            self.voice_verbose = parse_flag(&verbose)
                .with_context(|| format!("Invalid SENTIGUARD_VOICE_VERBOSE: {}", verbose))?;
        }
        self.validate()
    }

    /// 检查两个端点地址是否合法
    pub fn validate(&self) -> anyhow::Result<()> {
        let ws = Url::parse(&self.ws_url).with_context(|| format!("Invalid ws_url: {}", self.ws_url))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            anyhow::bail!("ws_url must use ws:// or wss://, got {}", self.ws_url);
        }
        let api = Url::parse(&self.api_url).with_context(|| format!("Invalid api_url: {}", self.api_url))?;
        if !matches!(api.scheme(), "http" | "https") {
            anyhow::bail!("api_url must use http:// or https://, got {}", self.api_url);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
