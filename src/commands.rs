use crate::snapshot::{SnapshotError, SnapshotSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCommand {
    ResolveAlert(i64),
    TriggerCrisis,
}

/// 后端对一条命令的答复，由主循环交回控制器处理
#[derive(Debug)]
pub struct CommandOutcome {
    pub command: BackendCommand,
    pub result: Result<(), SnapshotError>,
}

/// 在后台执行面向后端的命令，不阻塞主循环。
/// 命令之间互不等待，结果按完成顺序送回。
pub struct CommandRunner {
    source: Arc<dyn SnapshotSource>,
    tx: mpsc::Sender<CommandOutcome>,
    tasks: JoinSet<()>,
}

impl CommandRunner {
    pub fn new(source: Arc<dyn SnapshotSource>, tx: mpsc::Sender<CommandOutcome>) -> Self {
        Self {
            source,
            tx,
            tasks: JoinSet::new(),
        }
    }

    pub fn submit(&mut self, command: BackendCommand) {
        // 顺手回收已经结束的任务
        while self.tasks.try_join_next().is_some() {}

        let source = self.source.clone();
        let tx = self.tx.clone();
        self.tasks.spawn(async move {
            let result = match command {
                BackendCommand::ResolveAlert(id) => source.resolve_alert(id).await,
                BackendCommand::TriggerCrisis => source.trigger_crisis().await,
            };
            if tx.send(CommandOutcome { command, result }).await.is_err() {
                log::debug!("{:?} finished after the session closed", command);
            }
        });
    }

    /// teardown 时调用，还没有答复的命令直接放弃
    pub fn cancel(&mut self) {
        if !self.tasks.is_empty() {
            log::info!("Abandoning {} pending backend command(s)", self.tasks.len());
        }
        self.tasks.abort_all();
    }
}
