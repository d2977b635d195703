//! 核心层：错误与恢复、播放状态、优雅关闭、命令路由

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod shutdown;
pub mod state;

pub use error::{RecoveryAction, RepError, Result};
pub use orchestrator::{spawn_runtime, Command, CommandOutcome, CommandRouter, ParseCommandError};
pub use recovery::RecoveryEngine;
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::PlaybackState;
