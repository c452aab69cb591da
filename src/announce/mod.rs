pub mod announcer;
pub mod gate;

pub use announcer::{Announcer, AnnouncerKind, CommandAnnouncer, LogAnnouncer, NoopAnnouncer};
pub use gate::AnnouncementGate;

use crate::config::Config;
use std::sync::Arc;

/// 根据配置选择播报实现
pub fn init_announcer(config: &Config) -> Arc<dyn Announcer> {
    let announcer: Arc<dyn Announcer> = match config.announcer {
        AnnouncerKind::Log => Arc::new(LogAnnouncer),
        AnnouncerKind::None => Arc::new(NoopAnnouncer),
        AnnouncerKind::Command => Arc::new(CommandAnnouncer::new(
            config.voice_command.clone(),
            config.voice_args.clone(),
        )),
    };
    log::info!("Voice announcer: {:?} (verbose: {})", config.announcer, config.voice_verbose);
    announcer
}
