//! 视频队列：FIFO 播放列表 + 打断时在队首插入过渡片段
//!
//! 打断只在队首插入、从不丢弃已有条目，过渡片段播完后原序列按原顺序继续。

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{RepError, Result};
use crate::video::AssetSource;

/// 打断类型（封闭集合 1-4）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterruptType {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl InterruptType {
    pub const ALL: [InterruptType; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for InterruptType {
    type Error = RepError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            other => Err(RepError::InvalidInterrupt(other)),
        }
    }
}

/// 条目来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOrigin {
    Base,
    Transition(InterruptType),
    Manual,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub origin: EntryOrigin,
}

impl QueueEntry {
    pub fn base(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: EntryOrigin::Base,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.origin, EntryOrigin::Transition(_))
    }
}

/// 打断类型 -> 过渡片段序列（按播放顺序）；四个字段保证映射是全的
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionMap {
    pub one: Vec<PathBuf>,
    pub two: Vec<PathBuf>,
    pub three: Vec<PathBuf>,
    pub four: Vec<PathBuf>,
}

impl TransitionMap {
    /// 默认映射：1 -> t1；2 -> t2, t1；3 -> t3；4 -> t4, t4_1
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let clip = |name: &str| dir.join(format!("{name}.mp4"));
        Self {
            one: vec![clip("transition1")],
            two: vec![clip("transition2"), clip("transition1")],
            three: vec![clip("transition3")],
            four: vec![clip("transition4"), clip("transition4_1")],
        }
    }

    pub fn sequence(&self, kind: InterruptType) -> &[PathBuf] {
        match kind {
            InterruptType::One => &self.one,
            InterruptType::Two => &self.two,
            InterruptType::Three => &self.three,
            InterruptType::Four => &self.four,
        }
    }

    /// 所有过渡片段（去重）
    pub fn all_clips(&self) -> Vec<&PathBuf> {
        let mut clips: Vec<&PathBuf> = Vec::new();
        for kind in InterruptType::ALL {
            for p in self.sequence(kind) {
                if !clips.contains(&p) {
                    clips.push(p);
                }
            }
        }
        clips
    }
}

pub struct VideoQueue {
    queue: VecDeque<QueueEntry>,
    transitions: TransitionMap,
    assets: Arc<dyn AssetSource>,
    /// 每次队首插入 +1
    revision: u64,
}

impl VideoQueue {
    /// 构造时校验全部过渡片段存在；缺失即致命错误
    pub fn new(
        base: impl IntoIterator<Item = PathBuf>,
        transitions: TransitionMap,
        assets: Arc<dyn AssetSource>,
    ) -> Result<Self> {
        for path in transitions.all_clips() {
            if !assets.exists(path) {
                return Err(RepError::AssetNotFound(path.clone()));
            }
        }
        Ok(Self {
            queue: base.into_iter().map(QueueEntry::base).collect(),
            transitions,
            assets,
            revision: 0,
        })
    }

    /// 在队首插入该打断类型的过渡序列，保持序列内部顺序
    pub fn handle_interrupt(&mut self, interrupt_type: u8) -> Result<InterruptType> {
        let kind = InterruptType::try_from(interrupt_type)?;
        for path in self.transitions.sequence(kind).iter().rev() {
            self.queue.push_front(QueueEntry {
                path: path.clone(),
                origin: EntryOrigin::Transition(kind),
            });
        }
        self.revision += 1;
        tracing::debug!(
            interrupt = kind.code(),
            queued = self.queue.len(),
            "transitions injected"
        );
        Ok(kind)
    }

    pub fn next(&mut self) -> Result<QueueEntry> {
        self.queue.pop_front().ok_or(RepError::QueueEmpty)
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, to_front: bool) -> Result<()> {
        let path = path.into();
        if !self.assets.exists(&path) {
            return Err(RepError::AssetNotFound(path));
        }
        let entry = QueueEntry {
            path,
            origin: EntryOrigin::Manual,
        };
        if to_front {
            self.queue.push_front(entry);
            self.revision += 1;
        } else {
            self.queue.push_back(entry);
        }
        Ok(())
    }

    /// 放回一个取出后未播放的片段：过渡片段回到队首，其余排在队首的过渡片段之后
    pub fn requeue(&mut self, entry: QueueEntry) {
        let at = if entry.is_transition() {
            0
        } else {
            self.queue.iter().take_while(|e| e.is_transition()).count()
        };
        self.queue.insert(at, entry);
    }

    /// 追加基础片段（播放列表重启时使用）
    pub fn extend_base(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.queue.extend(paths.into_iter().map(QueueEntry::base));
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.queue.front()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.queue.iter().map(|e| e.path.clone()).collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }
}
