//! 记忆库：只追加的类型化记录存储
//!
//! 支持 add / search(MemoryQuery) / recent(kind, limit)；所有查询只读，返回记录副本。

use std::sync::{Arc, RwLock};

use crate::memory::{KeywordScorer, Memory, MemoryId, MemoryKind, SimilarityScorer};

/// 类型化检索条件
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryQuery {
    pub kind: Option<MemoryKind>,
    pub text: Option<String>,
    pub limit: Option<usize>,
}

impl MemoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// 入库后的记录：seq 为插入序号，用于同一时间戳下的排序
struct Stored {
    seq: u64,
    memory: Memory,
}

/// 只追加的记忆库（线程安全）
pub struct MemoryStore {
    records: RwLock<Vec<Stored>>,
    scorer: Arc<dyn SimilarityScorer>,
}

impl MemoryStore {
    pub fn new(scorer: Arc<dyn SimilarityScorer>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            scorer,
        }
    }

    /// 追加一条记录，返回其 ID
    pub fn add(&self, memory: Memory) -> MemoryId {
        let id = memory.id;
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let seq = records.len() as u64;
        tracing::debug!(kind = %memory.kind, %id, "memory added");
        records.push(Stored { seq, memory });
        id
    }

    /// 按类型过滤、按相关度排序；无查询文本时退化为新到旧
    pub fn search(&self, query: &MemoryQuery) -> Vec<Memory> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let text = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty());

        let candidates: Vec<&Stored> = records
            .iter()
            .filter(|r| query.kind.map_or(true, |k| r.memory.kind == k))
            .collect();

        let mut scored: Vec<(f32, &Stored)> = match text {
            Some(t) => {
                let memories: Vec<&Memory> = candidates.iter().map(|r| &r.memory).collect();
                self.scorer
                    .score_all(t, &memories)
                    .into_iter()
                    .zip(candidates)
                    .filter(|(s, _)| *s > 0.0)
                    .collect()
            }
            None => candidates.into_iter().map(|r| (0.0, r)).collect(),
        };

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then_with(|| newest_first(a, b))
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        scored
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.memory.clone())
            .collect()
    }

    /// 最近 limit 条（可按类型过滤），新到旧
    pub fn recent(&self, kind: Option<MemoryKind>, limit: usize) -> Vec<Memory> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<&Stored> = records
            .iter()
            .filter(|r| kind.map_or(true, |k| r.memory.kind == k))
            .collect();
        matching.sort_by(|a, b| newest_first(a, b));
        matching
            .into_iter()
            .take(limit)
            .map(|r| r.memory.clone())
            .collect()
    }

    pub fn get(&self, id: MemoryId) -> Option<Memory> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .find(|r| r.memory.id == id)
            .map(|r| r.memory.clone())
    }

    pub fn count(&self, kind: MemoryKind) -> usize {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.iter().filter(|r| r.memory.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(KeywordScorer))
    }
}

/// 时间戳新者在前；相同时间戳时后插入者在前
fn newest_first(a: &Stored, b: &Stored) -> std::cmp::Ordering {
    b.memory
        .timestamp
        .cmp(&a.memory.timestamp)
        .then_with(|| b.seq.cmp(&a.seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn store_with(records: &[(MemoryKind, &str)]) -> MemoryStore {
        let store = MemoryStore::default();
        for (kind, content) in records {
            store.add(Memory::new(*kind, *content));
        }
        store
    }

    #[test]
    fn test_add_grows_monotonically() {
        let store = MemoryStore::default();
        assert!(store.is_empty());
        let id = store.add(Memory::new(MemoryKind::Session, "session started"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().content, "session started");
    }

    #[test]
    fn test_recent_filters_kind_and_orders_newest_first() {
        let store = store_with(&[
            (MemoryKind::Objection, "o1"),
            (MemoryKind::Response, "r1"),
            (MemoryKind::Objection, "o2"),
            (MemoryKind::Objection, "o3"),
        ]);
        let recent = store.recent(Some(MemoryKind::Objection), 2);
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["o3", "o2"]);
        assert!(recent.iter().all(|m| m.kind == MemoryKind::Objection));
    }

    #[test]
    fn test_recent_ties_broken_by_insertion_order() {
        let store = MemoryStore::default();
        let t = Utc::now();
        store.add(Memory::new(MemoryKind::Followup, "first").with_timestamp(t));
        store.add(Memory::new(MemoryKind::Followup, "second").with_timestamp(t));
        store.add(Memory::new(MemoryKind::Followup, "older").with_timestamp(t - Duration::seconds(5)));
        let contents: Vec<_> = store
            .recent(None, 5)
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["second", "first", "older"]);
    }

    #[test]
    fn test_recent_limit_caps_results() {
        let store = store_with(&[
            (MemoryKind::Sentiment, "a"),
            (MemoryKind::Sentiment, "b"),
            (MemoryKind::Sentiment, "c"),
        ]);
        assert_eq!(store.recent(Some(MemoryKind::Sentiment), 2).len(), 2);
        assert!(store.recent(Some(MemoryKind::Background), 2).is_empty());
        assert!(store.recent(None, 0).is_empty());
    }

    #[test]
    fn test_search_ranks_by_relevance_within_kind() {
        let store = store_with(&[
            (MemoryKind::Objection, "the price is too high"),
            (MemoryKind::Objection, "we already use a competitor"),
            (MemoryKind::Objection, "price seems high"),
            (MemoryKind::Response, "price is flexible and not too high"),
        ]);
        let hits = store.search(
            &MemoryQuery::new()
                .text("is the price too high")
                .kind(MemoryKind::Objection),
        );
        let contents: Vec<_> = hits.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["the price is too high", "price seems high"]);
    }

    #[test]
    fn test_search_without_text_is_recency_with_limit() {
        let store = store_with(&[
            (MemoryKind::Background, "b1"),
            (MemoryKind::Background, "b2"),
            (MemoryKind::Background, "b3"),
        ]);
        let hits = store.search(&MemoryQuery::new().kind(MemoryKind::Background).limit(2));
        let contents: Vec<_> = hits.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["b3", "b2"]);
    }

    #[test]
    fn test_queries_do_not_mutate_records() {
        let store = store_with(&[(MemoryKind::Objection, "price too high")]);
        let before = store.recent(None, 10);
        let _ = store.search(&MemoryQuery::new().text("price"));
        let _ = store.recent(Some(MemoryKind::Objection), 1);
        assert_eq!(store.recent(None, 10), before);
        assert_eq!(store.len(), 1);
    }

    /// 记录查询文本的嵌入次数
    struct QueryCounter {
        query: &'static str,
        query_embeds: std::sync::atomic::AtomicUsize,
    }

    impl crate::memory::EmbeddingProvider for QueryCounter {
        fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
            if text == self.query {
                self.query_embeds
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
            Ok(if text.contains("price") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
        }
    }

    #[test]
    fn test_search_embeds_query_once_per_search() {
        let provider = Arc::new(QueryCounter {
            query: "about the price",
            query_embeds: std::sync::atomic::AtomicUsize::new(0),
        });
        let store = MemoryStore::new(Arc::new(crate::memory::EmbeddingScorer::new(provider.clone())));
        for content in ["price too high", "timeline is tight", "price vs competitor", "no budget"] {
            store.add(Memory::new(MemoryKind::Objection, content));
        }

        let hits = store.search(&MemoryQuery::new().text("about the price"));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|m| m.content.contains("price")));
        assert_eq!(
            provider.query_embeds.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
