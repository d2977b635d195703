//! 命令路由：主控循环
//!
//! 外部输入（stdin 行、信号）被解析成 Command，经 mpsc 通道交给后台任务；
//! 后台任务持有 CommandRouter，串行执行命令，并通过 watch 通道对外投影播放状态。
//! Play 在独立任务中启动播放循环；Stop 是取消点，执行后路由器退出。

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::agent::{InterruptOutcome, Interruption, InterruptionCoordinator, Reply};
use crate::core::{PlaybackState, RepError, Result, ShutdownManager, ShutdownReason};
use crate::video::Playlist;

/// 发往路由器的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 启动播放循环；已在运行时忽略
    Play,
    Pause,
    Resume,
    /// 停止播放并退出路由器
    Stop,
    HandleInterrupt(Interruption),
    /// 打断之外的普通对话
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown command: {0}")]
pub struct ParseCommandError(String);

impl FromStr for Command {
    type Err = ParseCommandError;

    /// `play` / `pause` / `resume` / `stop` / `interrupt <n> [utterance]` / `say <text>`
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head.to_lowercase().as_str() {
            "play" if rest.is_empty() => Ok(Command::Play),
            "pause" if rest.is_empty() => Ok(Command::Pause),
            "resume" if rest.is_empty() => Ok(Command::Resume),
            "stop" | "quit" if rest.is_empty() => Ok(Command::Stop),
            "interrupt" => {
                let (code, utterance) = match rest.split_once(char::is_whitespace) {
                    Some((code, utterance)) => (code, utterance.trim()),
                    None => (rest, ""),
                };
                let code = code
                    .parse::<u8>()
                    .map_err(|_| ParseCommandError(line.to_string()))?;
                Ok(Command::HandleInterrupt(Interruption::new(code, utterance)))
            }
            "say" if !rest.is_empty() => Ok(Command::Message(rest.to_string())),
            _ => Err(ParseCommandError(line.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Started,
    AlreadyRunning,
    Paused,
    Resumed,
    Stopped,
    Interrupted(InterruptOutcome),
    Replied(Reply),
}

/// 串行执行命令；持有播放循环任务句柄
pub struct CommandRouter {
    coordinator: Arc<InterruptionCoordinator>,
    playlist: Playlist,
    runner: Option<JoinHandle<Result<()>>>,
    done_tx: mpsc::UnboundedSender<Result<()>>,
}

impl CommandRouter {
    /// 返回路由器与播放循环结束通知的接收端
    pub fn new(
        coordinator: Arc<InterruptionCoordinator>,
        playlist: Playlist,
    ) -> (Self, mpsc::UnboundedReceiver<Result<()>>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        (
            Self {
                coordinator,
                playlist,
                runner: None,
                done_tx,
            },
            done_rx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.runner.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn dispatch(&mut self, cmd: Command) -> Result<CommandOutcome> {
        let controller = self.coordinator.controller();
        match cmd {
            Command::Play => {
                if self.is_running() {
                    tracing::debug!("play ignored: playlist already running");
                    return Ok(CommandOutcome::AlreadyRunning);
                }
                if controller.is_stopped() {
                    return Err(RepError::Stopped);
                }
                if self.playlist.is_empty() {
                    return Err(RepError::EmptyPlaylist(self.playlist.folder().to_path_buf()));
                }
                self.coordinator.start_session(&self.playlist);
                let runner = controller.clone();
                let playlist = self.playlist.clone();
                let done_tx = self.done_tx.clone();
                self.runner = Some(tokio::spawn(async move {
                    let result = runner.run(&playlist).await;
                    let _ = done_tx.send(result.clone());
                    result
                }));
                Ok(CommandOutcome::Started)
            }
            Command::Pause => {
                controller.pause().await?;
                Ok(CommandOutcome::Paused)
            }
            Command::Resume => {
                controller.resume().await?;
                Ok(CommandOutcome::Resumed)
            }
            Command::Stop => {
                let stopped = controller.stop().await;
                if let Some(runner) = self.runner.take() {
                    match runner.await {
                        Ok(Err(e)) => tracing::warn!("Playlist ended with error: {}", e),
                        Err(e) => tracing::error!("Playback task failed: {}", e),
                        Ok(Ok(())) => {}
                    }
                }
                stopped?;
                Ok(CommandOutcome::Stopped)
            }
            Command::HandleInterrupt(interruption) => self
                .coordinator
                .handle_interrupt(interruption)
                .await
                .map(CommandOutcome::Interrupted),
            Command::Message(text) => self
                .coordinator
                .handle_message(&text)
                .await
                .map(CommandOutcome::Replied),
        }
    }
}

/// 创建运行时：返回命令发送端、播放状态接收端、后台任务句柄。
/// 任务在 Stop、发送端全部关闭、关闭 token 取消或播放循环致命出错时结束；
/// 结束原因记录在 shutdown 上。
pub fn spawn_runtime(
    coordinator: Arc<InterruptionCoordinator>,
    playlist: Playlist,
    shutdown: ShutdownManager,
) -> (
    mpsc::UnboundedSender<Command>,
    watch::Receiver<PlaybackState>,
    JoinHandle<Result<()>>,
) {
    let state_rx = coordinator.controller().subscribe();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (mut router, mut done_rx) = CommandRouter::new(coordinator, playlist);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let cmd = match cmd {
                        Some(cmd) => cmd,
                        None => {
                            // 发送端已关闭，按 Stop 处理
                            shutdown.trigger(ShutdownReason::UserInitiated);
                            router.dispatch(Command::Stop).await?;
                            return Ok(());
                        }
                    };
                    let stop = cmd == Command::Stop;
                    if stop {
                        shutdown.trigger(ShutdownReason::UserInitiated);
                    }
                    match router.dispatch(cmd).await {
                        Ok(outcome) => tracing::debug!("command done: {:?}", outcome),
                        Err(e) if stop => return Err(e),
                        Err(e) => tracing::warn!("Command failed: {}", e),
                    }
                    if stop {
                        return Ok(());
                    }
                }
                _ = shutdown.cancelled() => {
                    router.dispatch(Command::Stop).await?;
                    return Ok(());
                }
                Some(result) = done_rx.recv() => {
                    if let Err(e) = result {
                        tracing::error!("Playback aborted: {}", e);
                        shutdown.trigger(ShutdownReason::FatalError(e.to_string()));
                        return Err(e);
                    }
                }
            }
        }
    });

    (cmd_tx, state_rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LlmResponder;
    use crate::config::MemorySection;
    use crate::llm::MockLlmClient;
    use crate::memory::{MemoryKind, MemoryStore};
    use crate::remote::MockRemote;
    use crate::video::{fixture, PlaybackController, PlaybackTimings};
    use std::time::{Duration, Instant};

    #[test]
    fn test_parse_commands() {
        assert_eq!("play".parse(), Ok(Command::Play));
        assert_eq!("  PAUSE ".parse(), Ok(Command::Pause));
        assert_eq!("resume".parse(), Ok(Command::Resume));
        assert_eq!("quit".parse(), Ok(Command::Stop));
        assert_eq!(
            "interrupt 2  not interested right now".parse(),
            Ok(Command::HandleInterrupt(Interruption::new(2, "not interested right now")))
        );
        assert_eq!(
            "interrupt 7".parse(),
            Ok(Command::HandleInterrupt(Interruption::new(7, "")))
        );
        assert_eq!(
            "say what does it cost?".parse(),
            Ok(Command::Message("what does it cost?".into()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("interrupt two".parse::<Command>().is_err());
        assert!("interrupt".parse::<Command>().is_err());
        assert!("say".parse::<Command>().is_err());
        assert!("play now".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    fn fast_timings() -> PlaybackTimings {
        PlaybackTimings {
            poll_interval: Duration::from_millis(5),
            max_wait: Duration::from_secs(5),
            load_settle: Duration::ZERO,
            error_backoff: Duration::from_millis(1),
            max_clip_retries: 1,
        }
    }

    fn coordinator(remote: &Arc<MockRemote>, dir: &tempfile::TempDir) -> Arc<InterruptionCoordinator> {
        let controller =
            PlaybackController::new(remote.clone(), fixture::queue(dir, vec![]), fast_timings());
        Arc::new(InterruptionCoordinator::new(
            controller,
            Arc::new(MemoryStore::default()),
            Arc::new(LlmResponder::new(Arc::new(MockLlmClient))),
            MemorySection::default(),
        ))
    }

    async fn wait_until(what: &str, f: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !f() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_router_play_is_idempotent_and_stop_joins_loop() {
        let (dir, base) = fixture::assets(&["base1.mp4"]);
        let remote = Arc::new(MockRemote::new(u32::MAX));
        let coord = coordinator(&remote, &dir);
        let (mut router, _done) = CommandRouter::new(coord.clone(), Playlist::new(base));

        assert_eq!(router.dispatch(Command::Play).await, Ok(CommandOutcome::Started));
        wait_until("playing", || coord.controller().state() == PlaybackState::Playing).await;
        assert_eq!(router.dispatch(Command::Play).await, Ok(CommandOutcome::AlreadyRunning));
        assert_eq!(remote.loads().len(), 1);
        assert_eq!(coord.memory().count(MemoryKind::Session), 1);

        assert_eq!(router.dispatch(Command::Stop).await, Ok(CommandOutcome::Stopped));
        assert!(!router.is_running());
        assert_eq!(router.dispatch(Command::Play).await, Err(RepError::Stopped));
    }

    #[tokio::test]
    async fn test_runtime_routes_interrupt_to_transitions() {
        let (dir, base) = fixture::assets(&["base1.mp4", "base2.mp4"]);
        let remote = Arc::new(MockRemote::new(u32::MAX));
        let coord = coordinator(&remote, &dir);
        let shutdown = ShutdownManager::new();
        let (cmd_tx, state_rx, handle) =
            spawn_runtime(coord.clone(), Playlist::new(base), shutdown.clone());

        cmd_tx.send(Command::Play).unwrap();
        wait_until("playing", || *state_rx.borrow() == PlaybackState::Playing).await;

        cmd_tx.send("interrupt 3 is this secure?".parse().unwrap()).unwrap();
        wait_until("transition loaded", || remote.loads().len() >= 2).await;
        assert_eq!(remote.loads()[1], dir.path().join("transition3.mp4"));
        assert_eq!(coord.memory().count(MemoryKind::Response), 1);

        cmd_tx.send(Command::Stop).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(*state_rx.borrow(), PlaybackState::Idle);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::UserInitiated));
    }

    #[tokio::test]
    async fn test_runtime_exits_when_remote_unavailable() {
        let (dir, base) = fixture::assets(&["base1.mp4"]);
        let remote = Arc::new(MockRemote::new(1));
        remote.set_unavailable(true);
        let shutdown = ShutdownManager::new();
        let (cmd_tx, _state_rx, handle) =
            spawn_runtime(coordinator(&remote, &dir), Playlist::new(base), shutdown.clone());

        cmd_tx.send(Command::Play).unwrap();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RepError::RemoteUnavailable(_))));
        assert!(shutdown.token().is_cancelled());
        assert!(matches!(shutdown.reason(), Some(ShutdownReason::FatalError(_))));
    }

    #[tokio::test]
    async fn test_runtime_stops_when_shutdown_triggered() {
        let (dir, base) = fixture::assets(&["base1.mp4"]);
        let remote = Arc::new(MockRemote::new(u32::MAX));
        let coord = coordinator(&remote, &dir);
        let shutdown = ShutdownManager::new();
        let (cmd_tx, state_rx, handle) =
            spawn_runtime(coord.clone(), Playlist::new(base), shutdown.clone());

        cmd_tx.send(Command::Play).unwrap();
        wait_until("playing", || *state_rx.borrow() == PlaybackState::Playing).await;

        shutdown.trigger(ShutdownReason::Signal);
        handle.await.unwrap().unwrap();
        assert!(coord.controller().is_stopped());
        assert_eq!(shutdown.reason(), Some(ShutdownReason::Signal));
    }
}
