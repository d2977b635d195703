//! 基础播放列表：从素材目录按通配符加载片段（按文件名排序），排除过渡片段

use std::path::{Path, PathBuf};

use crate::core::{RepError, Result};
use crate::video::TransitionMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Playlist {
    folder: PathBuf,
    clips: Vec<PathBuf>,
}

impl Playlist {
    pub fn new(clips: Vec<PathBuf>) -> Self {
        Self {
            folder: PathBuf::new(),
            clips,
        }
    }

    /// 扫描 folder 下匹配 pattern 的文件；没有任何片段时报 EmptyPlaylist
    pub fn from_folder(folder: &Path, pattern: &str, transitions: &TransitionMap) -> Result<Self> {
        let full = folder.join(pattern);
        let full = full.to_string_lossy();
        let entries = glob::glob(&full)
            .map_err(|e| RepError::Config(format!("invalid playlist pattern '{pattern}': {e}")))?;

        let skip = transitions.all_clips();
        let mut clips: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("Skipping unreadable playlist entry: {}", e);
                    None
                }
            })
            .filter(|p| p.is_file())
            .filter(|p| !skip.iter().any(|t| same_file(t, p)))
            .collect();
        clips.sort();

        if clips.is_empty() {
            return Err(RepError::EmptyPlaylist(folder.to_path_buf()));
        }
        tracing::info!("Found {} clips in {}", clips.len(), folder.display());
        Ok(Self {
            folder: folder.to_path_buf(),
            clips,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn clips(&self) -> &[PathBuf] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
