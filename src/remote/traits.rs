//! 远端媒体控制抽象
//!
//! 所有后端实现 MediaRemote：load / play / pause / stop / status。线协议（如 WebSocket RPC）由具体后端负责。

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::Result;

/// 远端播放器报告的媒体状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteMediaState {
    None,
    Playing,
    Opening,
    Buffering,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl RemoteMediaState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Ended | Self::Error)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    pub state: RemoteMediaState,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
}

impl RemoteStatus {
    pub fn new(state: RemoteMediaState) -> Self {
        Self {
            state,
            position_ms: None,
            duration_ms: None,
        }
    }
}

/// 连接级失败返回 RepError::RemoteUnavailable，单条命令失败返回 RepError::Remote
#[async_trait]
pub trait MediaRemote: Send + Sync {
    async fn load(&self, path: &Path) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn status(&self) -> Result<RemoteStatus>;
}
