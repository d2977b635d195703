//! 素材来源：只需判断片段是否存在

use std::path::Path;

pub trait AssetSource: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// 本地文件系统
#[derive(Clone, Copy, Debug, Default)]
pub struct FsAssets;

impl AssetSource for FsAssets {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
