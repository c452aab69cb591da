use super::announcer::Announcer;
use crate::dedup::RecencyWindow;
use std::sync::Arc;

pub const DIAGNOSTIC_MESSAGE: &str =
    "Voice alerts are now enabled. You will be notified of critical sentiment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// critical/high 总是播报，medium/low 只在 verbose 下播报
    pub fn message(self, verbose: bool) -> Option<&'static str> {
        match self {
            Self::Critical => Some("Critical alert detected! Immediate action required."),
            Self::High => Some("High priority alert detected."),
            Self::Medium if verbose => Some("Medium priority alert."),
            Self::Low if verbose => Some("New alert detected."),
            _ => None,
        }
    }
}

/// 决定一条告警要不要播报。
///
/// 每个告警 id 最多播报一次：进过账本的 id 不会再被播报，
/// 被静默掉的告警同样会记账，之后打开 verbose 也不会补播。
pub struct AnnouncementGate {
    ledger: RecencyWindow<i64>,
    verbose: bool,
    announcer: Arc<dyn Announcer>,
}

impl AnnouncementGate {
    pub fn new(announcer: Arc<dyn Announcer>, verbose: bool) -> Self {
        Self {
            ledger: RecencyWindow::new(),
            verbose,
            announcer,
        }
    }

    /// 返回是否真的交给了播报器
    pub async fn consider(&mut self, severity: &str, alert_id: i64) -> bool {
        if !self.ledger.insert(alert_id) {
            log::debug!("Alert {} already announced, skipping", alert_id);
            return false;
        }

        match Severity::parse(severity).message(self.verbose) {
            Some(message) => {
                self.announce(message).await;
                true
            }
            None => {
                log::debug!("Alert {} ({}) suppressed by voice policy", alert_id, severity);
                false
            }
        }
    }

    /// 不经过账本，直接播报一条诊断消息
    pub async fn test_announce(&mut self) {
        self.announce(DIAGNOSTIC_MESSAGE).await;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        if self.verbose != verbose {
            log::info!("Voice verbose mode: {}", verbose);
        }
        self.verbose = verbose;
    }

    /// 停止正在进行的播报
    pub async fn silence(&self) {
        self.announcer.cancel().await;
    }

    // 先取消再播报，两步都 await，保证顺序
    async fn announce(&self, message: &str) {
        self.announcer.cancel().await;
        if let Err(e) = self.announcer.speak(message).await {
            log::warn!("Announcement failed: {}", e);
        }
    }
}
