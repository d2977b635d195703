//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SALESREP__*` 覆盖（双下划线表示嵌套，如 `SALESREP__REMOTE__PORT=4455`），
//! 最后兼容旧变量 `OBS_SERVER_PWD` / `VIDEO_FOLDER`。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::RepError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteSection,
    pub playback: PlaybackSection,
    pub memory: MemorySection,
    pub agent: AgentSection,
}

/// [remote] 段：远端播放器连接目标
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// 远端媒体源名称
    pub source_name: String,
    /// 启动时检查端口可达性
    pub check_on_start: bool,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4455,
            password: None,
            source_name: "VideoPlayer".to_string(),
            check_on_start: false,
        }
    }
}

/// [playback] 段：素材目录、轮询与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSection {
    /// 基础播放列表目录（必填）
    pub asset_folder: Option<PathBuf>,
    pub transitions_dir: PathBuf,
    pub pattern: String,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
    pub load_settle_ms: u64,
    pub error_backoff_ms: u64,
    pub max_clip_retries: u32,
    /// 模拟远端时每个片段持续的轮询次数
    pub simulated_clip_polls: u32,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            asset_folder: None,
            transitions_dir: PathBuf::from("src/assets"),
            pattern: "*.mp4".to_string(),
            poll_interval_ms: 500,
            max_wait_secs: 600,
            load_settle_ms: 1000,
            error_backoff_ms: 2000,
            max_clip_retries: 1,
            simulated_clip_polls: 20,
        }
    }
}

/// [memory] 段：拼入 Prompt 的记忆条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// 每类相关记忆最多几条
    pub context_limit: usize,
    /// 最近打断记录条数
    pub recent_limit: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            context_limit: 3,
            recent_limit: 5,
        }
    }
}

/// [agent] 段：应答协作方
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 回复中出现该标记即恢复播放
    pub resume_marker: String,
    pub system_prompt: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            resume_marker: "RESUME_VIDEO".to_string(),
            system_prompt: None,
        }
    }
}

impl AppConfig {
    /// 缺少必填项即启动失败
    pub fn validate(&self) -> Result<(), RepError> {
        if self.remote.password.as_deref().unwrap_or("").is_empty() {
            return Err(RepError::Config(
                "remote.password not set (SALESREP__REMOTE__PASSWORD or OBS_SERVER_PWD)".into(),
            ));
        }
        if self.playback.asset_folder.is_none() {
            return Err(RepError::Config(
                "playback.asset_folder not set (SALESREP__PLAYBACK__ASSET_FOLDER or VIDEO_FOLDER)".into(),
            ));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（不存在即报错）
/// 3. 叠加环境变量 SALESREP__*
/// 4. 旧变量 OBS_SERVER_PWD / VIDEO_FOLDER 最后覆盖
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    // 显式指定的文件必须存在
    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SALESREP")
            .separator("__")
            .try_parsing(true),
    );

    builder = builder
        .set_override_option("remote.password", std::env::var("OBS_SERVER_PWD").ok())?
        .set_override_option("playback.asset_folder", std::env::var("VIDEO_FOLDER").ok())?;

    let c = builder.build()?;
    c.try_deserialize()
}
