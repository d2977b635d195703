//! 播放控制器：一次驱动一个片段的状态机
//!
//! 每个片段：Idle → Loading → Playing → {Ended | Errored} → Idle；外部暂停时 Playing → Stopped。
//! 发出播放命令后以固定间隔轮询远端状态，直到终态、超时、暂停或 stop()。
//! 队列、当前片段与暂停记录由同一把锁（deck）保护；状态与暂停信号通过 watch 广播。
//! 暂停信号带代数：轮询方即使在 resume 之后才醒来，也能发现中间发生过暂停。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::PlaybackSection;
use crate::core::{PlaybackState, RecoveryAction, RecoveryEngine, RepError, Result};
use crate::remote::{MediaRemote, RemoteMediaState};
use crate::video::{InterruptType, Playlist, QueueEntry, VideoQueue};

/// 轮询与重试参数
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackTimings {
    pub poll_interval: Duration,
    /// 单个片段最长等待，超过即视为结束并前进
    pub max_wait: Duration,
    /// load 之后、play 之前的等待
    pub load_settle: Duration,
    pub error_backoff: Duration,
    /// 同一片段出错后的重试次数上限
    pub max_clip_retries: u32,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(600),
            load_settle: Duration::from_secs(1),
            error_backoff: Duration::from_secs(2),
            max_clip_retries: 1,
        }
    }
}

impl From<&PlaybackSection> for PlaybackTimings {
    fn from(cfg: &PlaybackSection) -> Self {
        Self {
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            max_wait: Duration::from_secs(cfg.max_wait_secs),
            load_settle: Duration::from_millis(cfg.load_settle_ms),
            error_backoff: Duration::from_millis(cfg.error_backoff_ms),
            max_clip_retries: cfg.max_clip_retries,
        }
    }
}

/// 单个片段的结束方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipOutcome {
    Ended,
    /// 远端自行停止
    Stopped,
    /// 重试后仍出错，已跳过
    Errored,
    /// 远端命令失败，按恢复策略直接跳过
    Skipped,
    /// 超过最长等待
    TimedOut,
    /// 被 pause() 打断，等待 resume
    Paused,
    /// 被 stop() 取消
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    pub entry: QueueEntry,
    pub outcome: ClipOutcome,
    pub attempts: u32,
}

/// 暂停标志与暂停代数（每次 pause() +1）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PauseSignal {
    paused: bool,
    epoch: u64,
}

enum ResumeMode {
    /// 继续播放被暂停的片段；携带恢复时的暂停代数
    InPlace(u64),
    /// 暂停期间队首有插入，前进到下一个
    Advance,
    Cancelled,
}

struct Deck {
    queue: VideoQueue,
    current: Option<QueueEntry>,
    /// current 是否已真正开始播放
    started: bool,
    pause_revision: u64,
    resume_in_place: bool,
}

struct Shared {
    remote: Arc<dyn MediaRemote>,
    deck: Mutex<Deck>,
    state_tx: watch::Sender<PlaybackState>,
    pause_tx: watch::Sender<PauseSignal>,
    cancel: CancellationToken,
    timings: PlaybackTimings,
    recovery: RecoveryEngine,
}

/// 可克隆的控制器句柄；播放循环与打断路径共享同一实例
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(remote: Arc<dyn MediaRemote>, queue: VideoQueue, timings: PlaybackTimings) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (pause_tx, _) = watch::channel(PauseSignal::default());
        Self {
            shared: Arc::new(Shared {
                remote,
                deck: Mutex::new(Deck {
                    queue,
                    current: None,
                    started: false,
                    pause_revision: 0,
                    resume_in_place: false,
                }),
                state_tx,
                pause_tx,
                cancel: CancellationToken::new(),
                timings,
                recovery: RecoveryEngine::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        *self.shared.state_tx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.pause_signal().paused
    }

    fn pause_signal(&self) -> PauseSignal {
        *self.shared.pause_tx.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// 正在播放（或暂停中）的片段
    pub async fn current(&self) -> Option<QueueEntry> {
        self.shared.deck.lock().await.current.clone()
    }

    /// 在 deck 锁内操作队列
    pub async fn with_queue<R>(&self, f: impl FnOnce(&mut VideoQueue) -> R) -> R {
        let mut deck = self.shared.deck.lock().await;
        f(&mut deck.queue)
    }

    pub async fn inject_interrupt(&self, interrupt_type: u8) -> Result<InterruptType> {
        self.with_queue(|q| q.handle_interrupt(interrupt_type)).await
    }

    pub async fn enqueue(&self, path: impl Into<PathBuf>, to_front: bool) -> Result<()> {
        let path = path.into();
        self.with_queue(|q| q.add(path, to_front)).await
    }

    pub async fn queue_len(&self) -> usize {
        self.with_queue(|q| q.size()).await
    }

    pub async fn queue_paths(&self) -> Vec<PathBuf> {
        self.with_queue(|q| q.paths()).await
    }

    fn transition(&self, next: PlaybackState) {
        self.shared.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            if !state.can_transition_to(next) {
                tracing::warn!("Unexpected playback transition {} -> {}", state, next);
            }
            tracing::debug!("playback {} -> {}", state, next);
            *state = next;
            true
        });
    }

    /// 取出队首片段并播放，阻塞到终态；出错时有界重试后跳过
    pub async fn play_next(&self) -> Result<PlaybackReport> {
        if self.is_stopped() {
            return Err(RepError::Stopped);
        }
        let entry = {
            let mut deck = self.shared.deck.lock().await;
            let entry = deck.queue.next()?;
            deck.current = Some(entry.clone());
            deck.started = false;
            entry
        };

        let result = self.drive(&entry).await;
        if !matches!(result, Ok((ClipOutcome::Paused, _))) {
            self.shared.deck.lock().await.current = None;
        }
        let (outcome, attempts) = result?;
        Ok(PlaybackReport {
            entry,
            outcome,
            attempts,
        })
    }

    async fn drive(&self, entry: &QueueEntry) -> Result<(ClipOutcome, u32)> {
        let max_retries = self.shared.timings.max_clip_retries;
        let mut attempts = 1;
        let mut outcome = self.play_entry(entry).await?;

        while outcome == ClipOutcome::Errored {
            let err = RepError::Playback {
                path: entry.path.clone(),
                reason: format!("remote reported error on attempt {attempts}"),
            };
            let retry = self.shared.recovery.handle(&err) == RecoveryAction::RetryOnce
                && attempts <= max_retries;
            if !retry {
                tracing::warn!("{}; skipping", err);
                self.backoff().await;
                break;
            }
            tracing::warn!("{}; retrying ({}/{})", err, attempts, max_retries);
            if !self.backoff().await {
                return Ok((ClipOutcome::Cancelled, attempts));
            }
            attempts += 1;
            outcome = self.play_entry(entry).await?;
        }
        Ok((outcome, attempts))
    }

    async fn play_entry(&self, entry: &QueueEntry) -> Result<ClipOutcome> {
        let epoch = self.pause_signal().epoch;
        tracing::info!("Playing: {}", entry.path.display());
        self.transition(PlaybackState::Loading);

        if let Err(e) = self.load_and_play(entry).await {
            self.transition(PlaybackState::Errored);
            return match self.shared.recovery.handle(&e) {
                RecoveryAction::RetryOnce => {
                    tracing::warn!("Error playing {}: {}", entry.path.display(), e);
                    Ok(ClipOutcome::Errored)
                }
                RecoveryAction::Abort => Err(e),
                action => {
                    tracing::warn!("Skipping {}: {} ({:?})", entry.path.display(), e, action);
                    Ok(ClipOutcome::Skipped)
                }
            };
        }

        {
            let mut deck = self.shared.deck.lock().await;
            let signal = self.pause_signal();
            if signal.paused {
                // pause() 在加载期间到达：远端刚开始播放，补一次暂停
                self.shared.remote.pause().await?;
                self.transition(PlaybackState::Stopped);
                return Ok(ClipOutcome::Paused);
            }
            if signal.epoch != epoch {
                // 加载期间已暂停又恢复，由 resume 的决定接手
                return Ok(ClipOutcome::Paused);
            }
            deck.started = true;
            self.transition(PlaybackState::Playing);
        }

        let outcome = self.wait_for_terminal(entry, epoch).await?;
        if outcome == ClipOutcome::Ended {
            tracing::info!("Finished playing: {}", entry.path.display());
        }
        Ok(outcome)
    }

    async fn load_and_play(&self, entry: &QueueEntry) -> Result<()> {
        let remote = &self.shared.remote;
        remote.stop().await?;
        remote.load(&entry.path).await?;
        let settle = self.shared.timings.load_settle;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        remote.play().await
    }

    /// 轮询远端直到终态；暂停代数变化即返回 Paused。状态查询失败只记日志，超时后前进
    async fn wait_for_terminal(&self, entry: &QueueEntry, epoch: u64) -> Result<ClipOutcome> {
        let timings = &self.shared.timings;
        let started = Instant::now();
        let mut pause_rx = self.shared.pause_tx.subscribe();
        let mut ticker = tokio::time::interval(timings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let signal = *pause_rx.borrow_and_update();
            if signal.paused || signal.epoch != epoch {
                if signal.paused {
                    self.transition(PlaybackState::Stopped);
                }
                return Ok(ClipOutcome::Paused);
            }
            tokio::select! {
                _ = self.shared.cancel.cancelled() => return Ok(ClipOutcome::Cancelled),
                _ = pause_rx.changed() => continue,
                _ = ticker.tick() => {}
            }

            match self.shared.remote.status().await {
                Ok(status) => match status.state {
                    RemoteMediaState::Ended => {
                        self.transition(PlaybackState::Ended);
                        return Ok(ClipOutcome::Ended);
                    }
                    RemoteMediaState::Stopped => {
                        self.transition(PlaybackState::Stopped);
                        return Ok(ClipOutcome::Stopped);
                    }
                    RemoteMediaState::Error => {
                        self.transition(PlaybackState::Errored);
                        return Ok(ClipOutcome::Errored);
                    }
                    _ => {}
                },
                Err(e @ RepError::RemoteUnavailable(_)) => return Err(e),
                Err(e) => tracing::warn!("Error checking media state: {}", e),
            }

            if started.elapsed() >= timings.max_wait {
                tracing::warn!(
                    "{} did not finish within {:?}; moving on",
                    entry.path.display(),
                    timings.max_wait
                );
                self.transition(PlaybackState::Stopped);
                return Ok(ClipOutcome::TimedOut);
            }
        }
    }

    /// 幂等；可在轮询进行中调用。不修改队列
    pub async fn pause(&self) -> Result<()> {
        let mut deck = self.shared.deck.lock().await;
        if self.is_paused() {
            tracing::debug!("pause ignored: already paused");
            return Ok(());
        }
        deck.pause_revision = deck.queue.revision();
        self.shared.pause_tx.send_modify(|signal| {
            signal.paused = true;
            signal.epoch += 1;
        });

        if matches!(self.state(), PlaybackState::Loading | PlaybackState::Playing) {
            self.shared.remote.pause().await?;
            self.transition(PlaybackState::Stopped);
        }
        tracing::info!("Playback paused");
        Ok(())
    }

    /// 暂停期间队首无插入则原地继续，否则交给播放循环前进到插入的片段。
    /// 尚未开始播放的当前片段放回过渡片段之后
    pub async fn resume(&self) -> Result<()> {
        let mut deck = self.shared.deck.lock().await;
        if !self.is_paused() {
            tracing::debug!("resume ignored: not paused");
            return Ok(());
        }
        let in_place = deck.current.is_some() && deck.queue.revision() == deck.pause_revision;
        deck.resume_in_place = in_place;
        if in_place {
            self.shared.remote.play().await?;
            deck.started = true;
            self.transition(PlaybackState::Playing);
            tracing::info!("Playback resumed in place");
        } else {
            if !deck.started {
                if let Some(entry) = deck.current.take() {
                    tracing::info!("Requeueing unplayed clip {}", entry.path.display());
                    deck.queue.requeue(entry);
                }
            }
            tracing::info!("Playback resumed with next queued clip");
        }
        self.shared.pause_tx.send_modify(|signal| signal.paused = false);
        Ok(())
    }

    /// 取消点：结束播放循环并停止远端。stop 之后控制器不可再用
    pub async fn stop(&self) -> Result<()> {
        if self.is_stopped() {
            return Ok(());
        }
        self.shared.cancel.cancel();
        let result = self.shared.remote.stop().await;
        self.transition(PlaybackState::Idle);
        tracing::info!("Stopping video playback...");
        result
    }

    /// 连续播放；队列耗尽时从 base 重新开始，直到 stop() 或致命错误
    pub async fn run(&self, base: &Playlist) -> Result<()> {
        if base.is_empty() {
            return Err(RepError::EmptyPlaylist(base.folder().to_path_buf()));
        }
        tracing::info!("Starting playlist...");
        let result = self.run_loop(base).await;
        self.transition(PlaybackState::Idle);
        result
    }

    async fn run_loop(&self, base: &Playlist) -> Result<()> {
        loop {
            if self.is_stopped() {
                return Ok(());
            }
            // 片段之间收到暂停：恢复前不取下一个
            if self.is_paused() && matches!(self.wait_for_resume().await, ResumeMode::Cancelled) {
                return Ok(());
            }
            let report = match self.play_next().await {
                Ok(report) => report,
                Err(RepError::Stopped) => return Ok(()),
                Err(e) => match self.shared.recovery.handle(&e) {
                    RecoveryAction::RestartPlaylist => {
                        tracing::info!("Restarting playlist from beginning...");
                        self.with_queue(|q| q.extend_base(base.clips().iter().cloned()))
                            .await;
                        continue;
                    }
                    RecoveryAction::Abort => {
                        tracing::error!("Playback error: {}", e);
                        return Err(e);
                    }
                    action => {
                        tracing::warn!("Playback error: {} ({:?})", e, action);
                        if !self.backoff().await {
                            return Ok(());
                        }
                        continue;
                    }
                },
            };

            match report.outcome {
                ClipOutcome::Paused => self.hold(&report.entry).await?,
                ClipOutcome::Cancelled => return Ok(()),
                _ => {}
            }
        }
    }

    /// 暂停中：等 resume 后原地继续或前进
    async fn hold(&self, entry: &QueueEntry) -> Result<()> {
        loop {
            match self.wait_for_resume().await {
                ResumeMode::Cancelled => return Ok(()),
                ResumeMode::Advance => {
                    self.shared.deck.lock().await.current = None;
                    return Ok(());
                }
                ResumeMode::InPlace(epoch) => {
                    let outcome = self.wait_for_terminal(entry, epoch).await?;
                    if outcome != ClipOutcome::Paused {
                        self.shared.deck.lock().await.current = None;
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn wait_for_resume(&self) -> ResumeMode {
        let mut pause_rx = self.shared.pause_tx.subscribe();
        let epoch = loop {
            let signal = *pause_rx.borrow_and_update();
            if !signal.paused {
                break signal.epoch;
            }
            tokio::select! {
                _ = self.shared.cancel.cancelled() => return ResumeMode::Cancelled,
                changed = pause_rx.changed() => {
                    if changed.is_err() {
                        return ResumeMode::Cancelled;
                    }
                }
            }
        };
        if self.is_stopped() {
            return ResumeMode::Cancelled;
        }
        if self.shared.deck.lock().await.resume_in_place {
            ResumeMode::InPlace(epoch)
        } else {
            ResumeMode::Advance
        }
    }

    /// 出错后的等待；被 stop() 打断返回 false
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.shared.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.shared.timings.error_backoff) => true,
        }
    }
}
