//! salesrep - 可被打断的虚拟销售代表视频编排引擎
//!
//! 模块划分：
//! - **agent**: 应答协作方、Prompt 构建、打断协调器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、播放状态、优雅关闭、命令路由
//! - **llm**: LLM 客户端抽象与离线 Mock
//! - **memory**: 交互记忆与相似度检索
//! - **observability**: 日志初始化
//! - **remote**: 远端播放器抽象与模拟实现
//! - **video**: 视频队列、基础播放列表、播放控制器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod remote;
pub mod video;
