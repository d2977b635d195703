//! 应答协作方：给定当前消息与相关记忆，返回回复内容与是否恢复播放

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::prompt::{build_system_prompt, DEFAULT_ROLE};
use crate::config::{AgentSection, MemorySection};
use crate::core::{RepError, Result};
use crate::llm::{LlmClient, Message};
use crate::memory::Memory;

/// 传给应答方的上下文
#[derive(Clone, Debug, Default)]
pub struct ResponseContext {
    pub current_message: String,
    pub relevant_memories: Vec<Memory>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// 应答方要求恢复播放
    pub resume: bool,
}

impl Reply {
    /// 从模型输出中剥离恢复标记
    pub fn parse(raw: &str, resume_marker: &str) -> Self {
        if resume_marker.is_empty() || !raw.contains(resume_marker) {
            return Self {
                content: raw.trim().to_string(),
                resume: false,
            };
        }
        Self {
            content: raw.replace(resume_marker, "").trim().to_string(),
            resume: true,
        }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, ctx: &ResponseContext) -> Result<Reply>;
}

/// 基于 LlmClient 的应答方：记忆拼入系统 Prompt，输出中的标记决定是否恢复
pub struct LlmResponder {
    llm: Arc<dyn LlmClient>,
    role: String,
    resume_marker: String,
    context_limit: usize,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            role: DEFAULT_ROLE.to_string(),
            resume_marker: AgentSection::default().resume_marker,
            context_limit: MemorySection::default().context_limit,
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, agent: &AgentSection, memory: &MemorySection) -> Self {
        Self {
            llm,
            role: agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            resume_marker: agent.resume_marker.clone(),
            context_limit: memory.context_limit,
        }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(&self, ctx: &ResponseContext) -> Result<Reply> {
        let system = build_system_prompt(
            &self.role,
            &ctx.relevant_memories,
            self.context_limit,
            &self.resume_marker,
        );
        let messages = [Message::system(system), Message::user(ctx.current_message.clone())];
        let raw = self
            .llm
            .complete(&messages)
            .await
            .map_err(RepError::Responder)?;
        Ok(Reply::parse(&raw, &self.resume_marker))
    }
}
