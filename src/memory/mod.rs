//! 记忆层：类型化记录、只追加存储、可插拔相关度打分

pub mod record;
pub mod similarity;
pub mod store;

pub use record::{Memory, MemoryId, MemoryKind, REF_KEY};
pub use similarity::{EmbeddingProvider, EmbeddingScorer, KeywordScorer, SimilarityScorer};
pub use store::{MemoryQuery, MemoryStore};
