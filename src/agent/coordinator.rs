//! 打断协调器
//!
//! 每次打断：记录 interruption 记忆 → 暂停播放 → 队首插入过渡片段 → 以相关记忆为上下文调用应答方
//! → 记录 response 记忆（ref 指回打断）→ 应答方要求时恢复播放，否则保持暂停等待外部决定。
//! 影响用户体验的失败都会留下记忆记录。

use std::sync::Arc;

use crate::agent::{Reply, Responder, ResponseContext};
use crate::config::MemorySection;
use crate::core::{RepError, Result};
use crate::memory::{Memory, MemoryId, MemoryKind, MemoryQuery, MemoryStore};
use crate::video::{InterruptType, PlaybackController, Playlist};

/// 一次打断：类型 + 用户原话（可为空）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interruption {
    pub interrupt_type: u8,
    pub utterance: String,
}

impl Interruption {
    pub fn new(interrupt_type: u8, utterance: impl Into<String>) -> Self {
        Self {
            interrupt_type,
            utterance: utterance.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterruptOutcome {
    pub interrupt_type: InterruptType,
    pub interruption_id: MemoryId,
    pub response_id: MemoryId,
    pub reply: Reply,
    pub resumed: bool,
}

pub struct InterruptionCoordinator {
    controller: PlaybackController,
    memory: Arc<MemoryStore>,
    responder: Arc<dyn Responder>,
    limits: MemorySection,
}

impl InterruptionCoordinator {
    pub fn new(
        controller: PlaybackController,
        memory: Arc<MemoryStore>,
        responder: Arc<dyn Responder>,
        limits: MemorySection,
    ) -> Self {
        Self {
            controller,
            memory,
            responder,
            limits,
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub async fn handle_interrupt(&self, interruption: Interruption) -> Result<InterruptOutcome> {
        let raw = interruption.interrupt_type;
        let utterance = interruption.utterance.trim().to_string();
        let parsed = InterruptType::try_from(raw);

        let mut record = Memory::new(MemoryKind::Interruption, utterance.clone())
            .with_meta("handled", false)
            .with_meta("interrupt_type", raw);
        if let Err(e) = &parsed {
            record = record.with_meta("error", e.to_string());
        }
        let interruption_id = self.memory.add(record);

        let kind = match parsed {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!("Rejected interrupt: {}", e);
                return Err(e);
            }
        };
        tracing::info!(interrupt = raw, "Handling interruption: {}", utterance);

        if let Err(e) = self.controller.pause().await {
            return Err(self.record_failure(interruption_id, "pause", e));
        }
        if let Err(e) = self.controller.inject_interrupt(kind.code()).await {
            return Err(self.record_failure(interruption_id, "inject_transitions", e));
        }

        let message = format!(
            "INTERRUPTION: {}\nPlease handle this objection appropriately.",
            if utterance.is_empty() { "(no transcript)" } else { &utterance }
        );
        let context = self.build_context(message, &utterance);
        let reply = match self.responder.respond(&context).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.record_failure(interruption_id, "respond", e)),
        };

        let response_id = self.memory.add(
            Memory::new(MemoryKind::Response, reply.content.clone())
                .with_meta("handled", true)
                .with_meta("context", "interruption_response")
                .with_meta("objection", utterance)
                .with_meta("interrupt_type", raw)
                .referencing(interruption_id),
        );

        let resumed = if reply.resume {
            if let Err(e) = self.controller.resume().await {
                return Err(self.record_failure(interruption_id, "resume", e));
            }
            true
        } else {
            tracing::info!("Playback stays paused awaiting a decision");
            false
        };

        Ok(InterruptOutcome {
            interrupt_type: kind,
            interruption_id,
            response_id,
            reply,
            resumed,
        })
    }

    /// 打断之外的一轮对话
    pub async fn handle_message(&self, text: &str) -> Result<Reply> {
        let context = self.build_context(text.to_string(), text);
        let reply = self.responder.respond(&context).await?;
        self.memory.add(
            Memory::new(MemoryKind::Response, reply.content.clone())
                .with_meta("user_message", text)
                .with_meta("successful", true),
        );
        Ok(reply)
    }

    pub fn record_objection(&self, text: &str) -> MemoryId {
        self.memory.add(
            Memory::new(MemoryKind::Objection, text)
                .with_meta("context", "interruption")
                .with_meta("handled", false),
        )
    }

    pub fn start_session(&self, playlist: &Playlist) -> MemoryId {
        self.memory.add(
            Memory::new(MemoryKind::Session, "playback session started")
                .with_meta("folder", playlist.folder().display().to_string())
                .with_meta("clips", playlist.len()),
        )
    }

    /// 最近的打断 + 与 query 相关的异议 / 回复 / 背景
    fn build_context(&self, current_message: String, query: &str) -> ResponseContext {
        let limit = self.limits.context_limit;
        let mut relevant = self
            .memory
            .recent(Some(MemoryKind::Interruption), self.limits.recent_limit);
        for kind in [MemoryKind::Objection, MemoryKind::Response, MemoryKind::Background] {
            let hits = self
                .memory
                .search(&MemoryQuery::new().kind(kind).text(query).limit(limit));
            relevant.extend(hits);
        }
        ResponseContext {
            current_message,
            relevant_memories: relevant,
        }
    }

    /// 记录一条指向原打断的失败记录（记录不可变，不改原记录）
    fn record_failure(&self, interruption_id: MemoryId, step: &str, err: RepError) -> RepError {
        tracing::warn!("Interruption {} failed at {}: {}", interruption_id, step, err);
        self.memory.add(
            Memory::new(MemoryKind::Interruption, format!("{step} failed"))
                .with_meta("handled", false)
                .with_meta("error", err.to_string())
                .referencing(interruption_id),
        );
        err
    }
}
