//! 关闭协调
//!
//! 信号、stop 命令、播放循环致命错误都汇到同一个 ShutdownManager：
//! 第一个原因被记录下来，token 取消后运行时派发 Stop，stdin 读取任务随之退出。

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// stop / quit 命令或 Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
    /// 播放循环无法继续（例如远端不可达）
    FatalError(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::UserInitiated => write!(f, "user requested stop"),
            ShutdownReason::Signal => write!(f, "terminated by signal"),
            ShutdownReason::FatalError(e) => write!(f, "fatal error: {}", e),
        }
    }
}

/// 可克隆的关闭句柄，克隆体共享 token 与原因
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 子任务用于 select! 的取消 token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 触发关闭。只有第一个原因生效，返回本次调用是否生效
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason.clone()).is_ok();
        if first {
            tracing::info!("Shutting down: {}", reason);
        } else {
            tracing::debug!("shutdown already requested, ignoring: {}", reason);
        }
        self.token.cancel();
        first
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().cloned()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, stopping playback...");
                manager.trigger(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = self.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, stopping playback...");
                    manager.trigger(ShutdownReason::Signal);
                }
            });
        }
    }
}
