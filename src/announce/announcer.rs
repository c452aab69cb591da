use async_trait::async_trait;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// 把一段文本播报出去的能力（语音或其他带外通知）
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
    /// 停止正在播报的内容，返回时播报已经结束
    async fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncerKind {
    Log,
    Command,
    None,
}

impl FromStr for AnnouncerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "command" => Ok(Self::Command),
            "none" | "off" => Ok(Self::None),
            other => Err(format!("unknown announcer: {}", other)),
        }
    }
}

/// 只写日志
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        log::info!("[voice] {}", text);
        Ok(())
    }

    async fn cancel(&self) {}
}

pub struct NoopAnnouncer;

#[async_trait]
impl Announcer for NoopAnnouncer {
    async fn speak(&self, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn cancel(&self) {}
}

/// 调用外部 TTS 程序（例如 espeak-ng），文本作为最后一个参数传入。
///
/// 同一时间只有一个子进程在播报。新的播报开始前，先杀掉旧进程并等它真正退出，
/// 整个过程在同一把锁里完成，cancel 和 speak 不会交错。
pub struct CommandAnnouncer {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandAnnouncer {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            current: Mutex::new(None),
        }
    }

    async fn stop(slot: &mut Option<Child>) {
        if let Some(mut child) = slot.take() {
            // 已经自然结束的进程不需要 kill
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            if let Err(e) = child.start_kill() {
                log::warn!("Failed to stop announcement process: {}", e);
            }
            if let Err(e) = child.wait().await {
                log::warn!("Failed to reap announcement process: {}", e);
            }
        }
    }
}

#[async_trait]
impl Announcer for CommandAnnouncer {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        let mut slot = self.current.lock().await;
        Self::stop(&mut slot).await;

        log::debug!("Spawning {} for announcement", self.program);
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn {}: {}", self.program, e))?;
        *slot = Some(child);
        Ok(())
    }

    async fn cancel(&self) {
        let mut slot = self.current.lock().await;
        Self::stop(&mut slot).await;
    }
}
