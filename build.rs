use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    network: Network,
    reconnect: Reconnect,
    snapshot: Snapshot,
    voice: Voice,
    dashboard: Dashboard,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
    api_url: String,
    ws_token: String,
}

#[derive(Deserialize)]
struct Reconnect {
    policy: String,
    delay_ms: u64,
    max_delay_ms: u64,
    jitter_ms: u64,
}

#[derive(Deserialize)]
struct Snapshot {
    sentiment_limit: u32,
    alert_limit: u32,
    stats_window_hours: u32,
}

#[derive(Deserialize)]
struct Voice {
    announcer: String,
    verbose: bool,
    command: String,
    args: Vec<String>,
}

#[derive(Deserialize)]
struct Dashboard {
    local_port: u16,
    remote_port: u16,
    buffer_size: usize,
    status_interval_secs: u64,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // 应用信息
    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 网络配置
    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);
    println!("cargo:rustc-env=API_URL={}", config.network.api_url);
    println!("cargo:rustc-env=WS_TOKEN={}", config.network.ws_token);

    // 重连策略
    println!("cargo:rustc-env=RECONNECT_POLICY={}", config.reconnect.policy);
    println!("cargo:rustc-env=RECONNECT_DELAY_MS={}", config.reconnect.delay_ms);
    println!("cargo:rustc-env=RECONNECT_MAX_DELAY_MS={}", config.reconnect.max_delay_ms);
    println!("cargo:rustc-env=RECONNECT_JITTER_MS={}", config.reconnect.jitter_ms);

    // 启动快照
    println!("cargo:rustc-env=SNAPSHOT_SENTIMENT_LIMIT={}", config.snapshot.sentiment_limit);
    println!("cargo:rustc-env=SNAPSHOT_ALERT_LIMIT={}", config.snapshot.alert_limit);
    println!("cargo:rustc-env=SNAPSHOT_STATS_WINDOW_HOURS={}", config.snapshot.stats_window_hours);

    // 语音播报，参数按空格拼接，运行时再拆开
    println!("cargo:rustc-env=VOICE_ANNOUNCER={}", config.voice.announcer);
    println!("cargo:rustc-env=VOICE_VERBOSE={}", config.voice.verbose);
    println!("cargo:rustc-env=VOICE_COMMAND={}", config.voice.command);
    println!("cargo:rustc-env=VOICE_ARGS={}", config.voice.args.join(" "));

    // Dashboard 进程配置
    println!("cargo:rustc-env=DASHBOARD_LOCAL_PORT={}", config.dashboard.local_port);
    println!("cargo:rustc-env=DASHBOARD_REMOTE_PORT={}", config.dashboard.remote_port);
    println!("cargo:rustc-env=DASHBOARD_BUFFER_SIZE={}", config.dashboard.buffer_size);
    println!("cargo:rustc-env=DASHBOARD_STATUS_INTERVAL_SECS={}", config.dashboard.status_interval_secs);
}
