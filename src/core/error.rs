//! 播放引擎错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 RepError 决定 RetryOnce / Skip / RestartPlaylist / Report / Abort。

use std::path::PathBuf;

use thiserror::Error;

/// 队列、播放状态机、远端播放器与应答协作方可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepError {
    /// 未知的打断类型（调用方错误，不重试）
    #[error("Invalid interrupt type: {0}")]
    InvalidInterrupt(u8),

    #[error("Video queue is empty")]
    QueueEmpty,

    #[error("Video not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    /// 远端报告片段播放出错
    #[error("Playback failed for {}: {reason}", path.display())]
    Playback { path: PathBuf, reason: String },

    /// 连接级错误，直接上报操作员，不自动重连
    #[error("Remote player unavailable: {0}")]
    RemoteUnavailable(String),

    /// 单条远端命令失败（连接仍在）
    #[error("Remote command failed: {0}")]
    Remote(String),

    #[error("No clips found in {}", .0.display())]
    EmptyPlaylist(PathBuf),

    #[error("Responder error: {0}")]
    Responder(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 控制器已被 stop()，不再接受播放
    #[error("Playback stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, RepError>;

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 同一片段再试一次（有界）
    RetryOnce,
    /// 跳过当前片段，继续下一个
    Skip,
    /// 队列耗尽：从基础播放列表重新开始
    RestartPlaylist,
    /// 报告给调用方（并写入记忆），不重试
    Report(String),
    /// 终止
    Abort,
}
