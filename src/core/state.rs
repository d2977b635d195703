//! 播放状态机定义
//!
//! 状态只由 PlaybackController 推进；外部通过 watch 通道观察，只能经由 pause / resume / stop 间接影响。

use serde::Serialize;

/// 控制器视角的播放状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    /// 外部暂停或远端停止
    Stopped,
    Ended,
    Errored,
}

impl PlaybackState {
    /// Stopped / Ended / Errored 之后控制器进入下一个片段
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Ended | Self::Errored)
    }

    /// 状态迁移表
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        use PlaybackState::*;
        if next == Idle || self == next {
            return true;
        }
        match self {
            Idle => next == Loading,
            Loading => matches!(next, Playing | Errored | Stopped),
            Playing => matches!(next, Ended | Errored | Stopped),
            Stopped => matches!(next, Playing | Loading),
            Ended | Errored => next == Loading,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}
