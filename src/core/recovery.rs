//! 错误恢复引擎
//!
//! 根据 RepError 类型返回 RecoveryAction，供播放循环与打断协调器决定是重试、跳过、重启播放列表、上报还是终止。

use crate::core::{RecoveryAction, RepError};

/// 将错误映射为可执行动作
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &RepError) -> RecoveryAction {
        match err {
            RepError::InvalidInterrupt(t) => {
                RecoveryAction::Report(format!("未知的打断类型 {t}，仅支持 1-4"))
            }
            RepError::QueueEmpty => RecoveryAction::RestartPlaylist,
            RepError::AssetNotFound(path) => {
                RecoveryAction::Report(format!("找不到视频文件 {}，已跳过", path.display()))
            }
            RepError::Playback { .. } => RecoveryAction::RetryOnce,
            RepError::Remote(_) => RecoveryAction::Skip,
            RepError::Responder(msg) => RecoveryAction::Report(format!("应答生成失败: {msg}")),
            RepError::RemoteUnavailable(_)
            | RepError::EmptyPlaylist(_)
            | RepError::Config(_)
            | RepError::Stopped => RecoveryAction::Abort,
        }
    }
}
