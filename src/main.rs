//! salesrep - 虚拟销售代表视频编排
//!
//! 入口：初始化日志、加载配置、扫描素材、建立播放控制器与打断协调器，
//! 然后从 stdin 读取命令；Ctrl+C / SIGTERM 经 ShutdownManager 转为 Stop，退出时记录关闭原因。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use salesrep::agent::{InterruptionCoordinator, LlmResponder};
use salesrep::config::load_config;
use salesrep::core::{spawn_runtime, Command, ShutdownManager};
use salesrep::llm::MockLlmClient;
use salesrep::memory::MemoryStore;
use salesrep::observability;
use salesrep::remote::{self, MockRemote};
use salesrep::video::{FsAssets, PlaybackController, PlaybackTimings, Playlist, TransitionMap, VideoQueue};

const USAGE: &str = "play | pause | resume | stop | interrupt <1-4> [utterance] | say <text>";

#[derive(Parser, Debug)]
#[command(name = "salesrep", version, about = "Interrupt-aware video sequencing for a virtual sales rep")]
struct Cli {
    /// 基础播放列表目录
    #[arg(env = "VIDEO_FOLDER")]
    folder: Option<PathBuf>,

    /// 额外的配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config).context("Failed to load config")?;
    if let Some(folder) = cli.folder {
        cfg.playback.asset_folder = Some(folder);
    }
    cfg.validate().context("Invalid configuration")?;
    let folder = cfg
        .playback
        .asset_folder
        .clone()
        .context("playback.asset_folder not set")?;

    let transitions = TransitionMap::from_dir(&cfg.playback.transitions_dir);
    let playlist = Playlist::from_folder(&folder, &cfg.playback.pattern, &transitions)
        .context("Failed to build base playlist")?;
    let queue = VideoQueue::new(Vec::new(), transitions, Arc::new(FsAssets))
        .context("Transition clips missing")?;

    if cfg.remote.check_on_start {
        remote::check_reachable(&cfg.remote.host, cfg.remote.port, Duration::from_secs(5))
            .await
            .context("Remote player check failed")?;
    }
    tracing::warn!(
        "Driving simulated player for source '{}'",
        cfg.remote.source_name
    );
    let remote = Arc::new(MockRemote::new(cfg.playback.simulated_clip_polls));
    let controller = PlaybackController::new(remote, queue, PlaybackTimings::from(&cfg.playback));

    let responder = Arc::new(LlmResponder::from_config(
        Arc::new(MockLlmClient),
        &cfg.agent,
        &cfg.memory,
    ));
    let coordinator = Arc::new(InterruptionCoordinator::new(
        controller,
        Arc::new(MemoryStore::default()),
        responder,
        cfg.memory.clone(),
    ));

    let shutdown = ShutdownManager::new();
    shutdown.install_signal_handlers();

    let (cmd_tx, mut state_rx, runtime) = spawn_runtime(coordinator, playlist, shutdown.clone());
    cmd_tx.send(Command::Play).context("Runtime not accepting commands")?;

    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            tracing::info!("Playback state: {}", state);
        }
    });

    // main 持有 cmd_tx 直到运行时结束，stdin 关闭不等于 stop
    let stdin_tx = cmd_tx.clone();
    let stdin_token = shutdown.token();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = stdin_token.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => line,
                    _ => break,
                },
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(cmd) => {
                    if stdin_tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{} (usage: {})", e, USAGE),
            }
        }
    });

    let result = runtime.await.context("Runtime task failed")?;
    drop(cmd_tx);
    match shutdown.reason() {
        Some(reason) => tracing::info!("Video playback stopped ({})", reason),
        None => tracing::info!("Video playback stopped"),
    }
    result.context("Playback aborted")?;
    Ok(())
}
