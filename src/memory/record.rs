//! 记忆记录：类型、内容、元数据、时间戳
//!
//! 记录创建后不可修改；更正通过新记录的 `ref` 元数据指向旧记录。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 记录 ID
pub type MemoryId = Uuid;

/// 引用另一条记录时使用的元数据键
pub const REF_KEY: &str = "ref";

/// 记忆类型（用于按类型过滤检索）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Objection,
    Response,
    Sentiment,
    Background,
    Followup,
    Session,
    Interruption,
}

impl MemoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Objection => "objection",
            Self::Response => "response",
            Self::Sentiment => "sentiment",
            Self::Background => "background",
            Self::Followup => "followup",
            Self::Session => "session",
            Self::Interruption => "interruption",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条记忆
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub kind: MemoryKind,
    pub content: String,
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Memory {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// 附加一项元数据（构造阶段使用，入库后不可再改）
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 指向另一条记录
    pub fn referencing(self, other: MemoryId) -> Self {
        self.with_meta(REF_KEY, other.to_string())
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// 被引用记录的 ID（若有）
    pub fn reference(&self) -> Option<MemoryId> {
        self.meta(REF_KEY)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// 渲染为 Prompt 片段
    pub fn to_prompt_block(&self) -> String {
        let context = serde_json::to_string_pretty(&self.metadata).unwrap_or_else(|_| "{}".into());
        format!(
            "Type: {}\nContent: {}\nContext: {}\nWhen: {}",
            self.kind,
            self.content,
            context,
            self.timestamp.to_rfc3339()
        )
    }
}
