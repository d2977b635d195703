//! LLM 客户端抽象
//!
//! 具体后端（模型选择、鉴权、请求）在本 crate 之外构造，只需实现 LlmClient。

use async_trait::async_trait;

use crate::llm::Message;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;
}
