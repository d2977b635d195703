//! 集成测试：打断 → 过渡片段 → 继续基础播放列表

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use salesrep::agent::{Interruption, InterruptionCoordinator, Reply, Responder, ResponseContext};
use salesrep::config::MemorySection;
use salesrep::core::{PlaybackState, RepError, Result};
use salesrep::memory::{MemoryKind, MemoryStore};
use salesrep::remote::MockRemote;
use salesrep::video::{ClipOutcome, FsAssets, PlaybackController, PlaybackTimings, Playlist, TransitionMap, VideoQueue};
use tempfile::TempDir;

/// 按顺序给出预设回复；用完后一律恢复播放
struct ScriptedResponder {
    replies: Mutex<Vec<Reply>>,
}

impl ScriptedResponder {
    fn new(mut replies: Vec<Reply>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn respond(&self, _ctx: &ResponseContext) -> Result<Reply> {
        let next = self.replies.lock().unwrap().pop();
        Ok(next.unwrap_or(Reply {
            content: "Let's continue.".into(),
            resume: true,
        }))
    }
}

struct Rig {
    dir: TempDir,
    base: Vec<PathBuf>,
    remote: Arc<MockRemote>,
    coordinator: InterruptionCoordinator,
}

impl Rig {
    fn new(polls_per_clip: u32, replies: Vec<Reply>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "transition1.mp4",
            "transition2.mp4",
            "transition3.mp4",
            "transition4.mp4",
            "transition4_1.mp4",
            "base1.mp4",
            "base2.mp4",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }
        let transitions = TransitionMap::from_dir(dir.path());
        let base = Playlist::from_folder(dir.path(), "*.mp4", &transitions)
            .unwrap()
            .clips()
            .to_vec();
        let queue = VideoQueue::new(Vec::new(), transitions, Arc::new(FsAssets)).unwrap();
        let remote = Arc::new(MockRemote::new(polls_per_clip));
        let timings = PlaybackTimings {
            poll_interval: Duration::from_millis(5),
            max_wait: Duration::from_secs(5),
            load_settle: Duration::ZERO,
            error_backoff: Duration::from_millis(1),
            max_clip_retries: 1,
        };
        let controller = PlaybackController::new(remote.clone(), queue, timings);
        let coordinator = InterruptionCoordinator::new(
            controller,
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedResponder::new(replies)),
            MemorySection::default(),
        );
        Self {
            dir,
            base,
            remote,
            coordinator,
        }
    }

    fn clip(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn start(&self) -> tokio::task::JoinHandle<Result<()>> {
        let controller = self.coordinator.controller().clone();
        let playlist = Playlist::new(self.base.clone());
        tokio::spawn(async move { controller.run(&playlist).await })
    }
}

async fn wait_until(what: &str, f: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !f() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn interrupt_plays_transitions_then_remaining_base() {
    let rig = Rig::new(40, vec![]);
    assert_eq!(rig.base, vec![rig.clip("base1.mp4"), rig.clip("base2.mp4")]);
    let runner = rig.start();

    let controller = rig.coordinator.controller();
    wait_until("base1 playing", || {
        controller.state() == PlaybackState::Playing && rig.remote.loads().len() == 1
    })
    .await;

    let outcome = rig
        .coordinator
        .handle_interrupt(Interruption::new(2, "we already have a vendor"))
        .await
        .unwrap();
    assert!(outcome.resumed);

    wait_until("base2 after transitions", || rig.remote.loads().len() >= 4).await;
    assert_eq!(
        rig.remote.loads()[..4],
        [
            rig.clip("base1.mp4"),
            rig.clip("transition2.mp4"),
            rig.clip("transition1.mp4"),
            rig.clip("base2.mp4"),
        ]
    );

    controller.stop().await.unwrap();
    runner.await.unwrap().unwrap();

    let memory = rig.coordinator.memory();
    assert_eq!(memory.count(MemoryKind::Interruption), 1);
    let response = memory.get(outcome.response_id).unwrap();
    assert_eq!(response.reference(), Some(outcome.interruption_id));
}

#[tokio::test]
async fn interrupt_without_resume_holds_playback() {
    let rig = Rig::new(
        u32::MAX,
        vec![Reply {
            content: "Let me bring in a colleague.".into(),
            resume: false,
        }],
    );
    let runner = rig.start();
    let controller = rig.coordinator.controller();
    wait_until("playing", || controller.state() == PlaybackState::Playing).await;

    let outcome = rig
        .coordinator
        .handle_interrupt(Interruption::new(4, "can I talk to a human?"))
        .await
        .unwrap();
    assert!(!outcome.resumed);
    assert!(controller.is_paused());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(rig.remote.loads().len(), 1, "paused playback must not advance");
    assert_eq!(
        controller.queue_paths().await[..2],
        [rig.clip("transition4.mp4"), rig.clip("transition4_1.mp4")]
    );

    controller.resume().await.unwrap();
    wait_until("transition4 loaded", || rig.remote.loads().len() >= 2).await;
    assert_eq!(rig.remote.loads()[1], rig.clip("transition4.mp4"));

    controller.stop().await.unwrap();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn invalid_interrupt_leaves_queue_untouched() {
    let rig = Rig::new(u32::MAX, vec![]);
    let runner = rig.start();
    let controller = rig.coordinator.controller();
    wait_until("playing", || controller.state() == PlaybackState::Playing).await;
    let before = controller.queue_paths().await;

    let err = rig
        .coordinator
        .handle_interrupt(Interruption::new(0, "huh"))
        .await
        .unwrap_err();
    assert_eq!(err, RepError::InvalidInterrupt(0));
    assert_eq!(controller.queue_paths().await, before);
    assert!(!controller.is_paused());
    assert_eq!(controller.state(), PlaybackState::Playing);

    let recorded = rig.coordinator.memory().recent(Some(MemoryKind::Interruption), 1);
    assert!(recorded[0].meta("error").is_some());

    controller.stop().await.unwrap();
    runner.await.unwrap().unwrap();
}

/// 片段之间收到暂停时取出的基础片段不能丢：打断后它排在过渡片段之后
#[tokio::test]
async fn clip_taken_between_pause_and_interrupt_plays_after_transitions() {
    let rig = Rig::new(
        1,
        vec![Reply {
            content: "Good question, one moment.".into(),
            resume: false,
        }],
    );
    let controller = rig.coordinator.controller();
    controller
        .with_queue(|q| q.extend_base(rig.base.clone()))
        .await;

    let report = controller.play_next().await.unwrap();
    assert_eq!(report.entry.path, rig.clip("base1.mp4"));
    assert_eq!(report.outcome, ClipOutcome::Ended);

    controller.pause().await.unwrap();
    let report = controller.play_next().await.unwrap();
    assert_eq!(report.entry.path, rig.clip("base2.mp4"));
    assert_eq!(report.outcome, ClipOutcome::Paused);

    let outcome = rig
        .coordinator
        .handle_interrupt(Interruption::new(2, "send me the pricing sheet"))
        .await
        .unwrap();
    assert!(!outcome.resumed);

    controller.resume().await.unwrap();
    assert_eq!(
        controller.queue_paths().await,
        [
            rig.clip("transition2.mp4"),
            rig.clip("transition1.mp4"),
            rig.clip("base2.mp4"),
        ]
    );

    let mut played = Vec::new();
    for _ in 0..3 {
        let report = controller.play_next().await.unwrap();
        assert_eq!(report.outcome, ClipOutcome::Ended);
        played.push(report.entry.path);
    }
    assert_eq!(
        played,
        [
            rig.clip("transition2.mp4"),
            rig.clip("transition1.mp4"),
            rig.clip("base2.mp4"),
        ]
    );
    assert_eq!(controller.state(), PlaybackState::Ended);
}

/// 暂停、插入、恢复连续发生在同一片段播放期间：轮询立即结束，随后播放插入的过渡片段
#[tokio::test]
async fn back_to_back_interrupt_and_resume_switches_to_transition() {
    let rig = Rig::new(u32::MAX, vec![]);
    let controller = rig.coordinator.controller();
    controller
        .with_queue(|q| q.extend_base(rig.base.clone()))
        .await;

    let playing = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.play_next().await })
    };
    wait_until("base1 playing", || controller.state() == PlaybackState::Playing).await;

    let outcome = rig
        .coordinator
        .handle_interrupt(Interruption::new(1, "how long is onboarding?"))
        .await
        .unwrap();
    assert!(outcome.resumed);

    let report = tokio::time::timeout(Duration::from_secs(1), playing)
        .await
        .expect("base1 poll must notice the interrupt")
        .unwrap()
        .unwrap();
    assert_eq!(report.entry.path, rig.clip("base1.mp4"));
    assert_eq!(report.outcome, ClipOutcome::Paused);
    assert_eq!(
        controller.queue_paths().await,
        [rig.clip("transition1.mp4"), rig.clip("base2.mp4")]
    );

    controller.stop().await.unwrap();
}
