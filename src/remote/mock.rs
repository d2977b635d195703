//! Mock 远端播放器（用于测试与无播放器时的模拟运行）
//!
//! 每个片段在 play 后经过固定次数的 status 轮询即报告 Ended；可按路径注入失败、模拟断线。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{RepError, Result};
use crate::remote::{MediaRemote, RemoteMediaState, RemoteStatus};

/// 记录下来的远端命令（status 不记录）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCommand {
    Load(PathBuf),
    Play,
    Pause,
    Stop,
}

#[derive(Debug)]
struct Inner {
    loaded: Option<PathBuf>,
    state: RemoteMediaState,
    polls_left: u32,
    /// None 表示每次都失败
    failures: HashMap<PathBuf, Option<u32>>,
    unavailable: bool,
    /// 接下来这么多次 load 命令本身失败
    load_failures: u32,
    commands: Vec<RemoteCommand>,
}

#[derive(Debug)]
pub struct MockRemote {
    polls_per_clip: u32,
    inner: Mutex<Inner>,
}

impl MockRemote {
    pub fn new(polls_per_clip: u32) -> Self {
        Self {
            polls_per_clip,
            inner: Mutex::new(Inner {
                loaded: None,
                state: RemoteMediaState::None,
                polls_left: 0,
                failures: HashMap::new(),
                unavailable: false,
                load_failures: 0,
                commands: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 该片段每次 play 都报告 Error
    pub fn fail_always(&self, path: impl Into<PathBuf>) {
        self.lock().failures.insert(path.into(), None);
    }

    /// 该片段前 times 次 play 报告 Error
    pub fn fail_times(&self, path: impl Into<PathBuf>, times: u32) {
        self.lock().failures.insert(path.into(), Some(times));
    }

    /// 接下来 times 次 load 返回 RepError::Remote（连接仍在）
    pub fn fail_loads(&self, times: u32) {
        self.lock().load_failures = times;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn commands(&self) -> Vec<RemoteCommand> {
        self.lock().commands.clone()
    }

    /// 按顺序加载过的片段
    pub fn loads(&self) -> Vec<PathBuf> {
        self.lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                RemoteCommand::Load(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn state(&self) -> RemoteMediaState {
        self.lock().state
    }

    fn check(inner: &Inner) -> Result<()> {
        if inner.unavailable {
            Err(RepError::RemoteUnavailable("mock remote disconnected".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MediaRemote for MockRemote {
    async fn load(&self, path: &Path) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        if inner.load_failures > 0 {
            inner.load_failures -= 1;
            return Err(RepError::Remote(format!("load rejected: {}", path.display())));
        }
        tracing::debug!("[mock remote] load {}", path.display());
        inner.commands.push(RemoteCommand::Load(path.to_path_buf()));
        inner.loaded = Some(path.to_path_buf());
        inner.state = RemoteMediaState::Opening;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.commands.push(RemoteCommand::Play);
        if inner.state == RemoteMediaState::Paused {
            inner.state = RemoteMediaState::Playing;
            return Ok(());
        }
        let Some(loaded) = inner.loaded.clone() else {
            inner.state = RemoteMediaState::Error;
            return Ok(());
        };
        let fails = match inner.failures.get_mut(&loaded) {
            Some(None) => true,
            Some(Some(n)) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        };
        if fails {
            inner.state = RemoteMediaState::Error;
        } else {
            inner.state = RemoteMediaState::Playing;
            inner.polls_left = self.polls_per_clip;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.commands.push(RemoteCommand::Pause);
        if inner.state == RemoteMediaState::Playing {
            inner.state = RemoteMediaState::Paused;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        inner.commands.push(RemoteCommand::Stop);
        if inner.loaded.is_some() {
            inner.state = RemoteMediaState::Stopped;
        }
        Ok(())
    }

    async fn status(&self) -> Result<RemoteStatus> {
        let mut inner = self.lock();
        Self::check(&inner)?;
        if inner.state == RemoteMediaState::Playing {
            if inner.polls_left == 0 {
                inner.state = RemoteMediaState::Ended;
            } else {
                inner.polls_left -= 1;
            }
        }
        let played = u64::from(self.polls_per_clip - inner.polls_left.min(self.polls_per_clip));
        Ok(RemoteStatus {
            state: inner.state,
            position_ms: Some(played * 500),
            duration_ms: Some(u64::from(self.polls_per_clip) * 500),
        })
    }
}
