//! 视频层：素材来源、队列（含过渡片段注入）、基础播放列表、播放控制器

pub mod assets;
pub mod controller;
pub mod playlist;
pub mod queue;

pub use assets::{AssetSource, FsAssets};
pub use controller::{ClipOutcome, PlaybackController, PlaybackReport, PlaybackTimings};
pub use playlist::Playlist;
pub use queue::{EntryOrigin, InterruptType, QueueEntry, TransitionMap, VideoQueue};

#[cfg(test)]
pub(crate) mod fixture {
    use std::fs::File;
    use std::path::PathBuf;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::{FsAssets, TransitionMap, VideoQueue};

    pub const TRANSITIONS: [&str; 5] = [
        "transition1.mp4",
        "transition2.mp4",
        "transition3.mp4",
        "transition4.mp4",
        "transition4_1.mp4",
    ];

    /// 临时素材目录：全部过渡片段 + 指定的基础片段
    pub fn assets(base: &[&str]) -> (TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        for name in TRANSITIONS {
            File::create(dir.path().join(name)).unwrap();
        }
        let base: Vec<PathBuf> = base.iter().map(|n| dir.path().join(n)).collect();
        for p in &base {
            File::create(p).unwrap();
        }
        (dir, base)
    }

    pub fn queue(dir: &TempDir, base: Vec<PathBuf>) -> VideoQueue {
        VideoQueue::new(base, TransitionMap::from_dir(dir.path()), Arc::new(FsAssets)).unwrap()
    }
}
