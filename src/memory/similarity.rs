//! 相关度打分：检索排序委托给可插拔的 SimilarityScorer
//!
//! 默认 KeywordScorer 按小写词重叠计分；EmbeddingScorer 接外部嵌入服务做余弦相似度。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::memory::{Memory, MemoryId};

/// 查询与单条记忆的相关度，越大越相关；<= 0 视为不相关
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, query: &str, memory: &Memory) -> f32;

    /// 一次检索对多条记忆打分；实现方可借此只处理一次查询文本
    fn score_all(&self, query: &str, memories: &[&Memory]) -> Vec<f32> {
        memories.iter().map(|m| self.score(query, m)).collect()
    }
}

/// 将文本切分为小写词集合
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 词重叠打分（无真实向量）
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordScorer;

fn overlap(query_tokens: &HashSet<String>, memory: &Memory) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let doc_tokens = tokenize_lower(&memory.content);
    query_tokens.intersection(&doc_tokens).count() as f32
}

impl SimilarityScorer for KeywordScorer {
    fn score(&self, query: &str, memory: &Memory) -> f32 {
        overlap(&tokenize_lower(query), memory)
    }

    fn score_all(&self, query: &str, memories: &[&Memory]) -> Vec<f32> {
        let query_tokens = tokenize_lower(query);
        memories.iter().map(|m| overlap(&query_tokens, m)).collect()
    }
}

/// 外部嵌入服务（向量计算不在本 crate 范围内）
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

/// 余弦相似度打分；每条记忆的向量按 ID 缓存（记录不可变，缓存无需失效）
pub struct EmbeddingScorer {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<HashMap<MemoryId, Vec<f32>>>,
}

impl EmbeddingScorer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn memory_vector(&self, memory: &Memory) -> Option<Vec<f32>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(v) = cache.get(&memory.id) {
            return Some(v.clone());
        }
        match self.provider.embed(&memory.content) {
            Ok(v) => {
                cache.insert(memory.id, v.clone());
                Some(v)
            }
            Err(e) => {
                tracing::warn!("embedding failed for memory {}: {}", memory.id, e);
                None
            }
        }
    }
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

impl EmbeddingScorer {
    fn query_vector(&self, query: &str) -> Option<Vec<f32>> {
        self.provider
            .embed(query)
            .map_err(|e| tracing::warn!("query embedding failed: {}", e))
            .ok()
    }

    fn against(&self, query_vec: &[f32], memory: &Memory) -> f32 {
        self.memory_vector(memory)
            .map(|v| cosine(query_vec, &v))
            .unwrap_or(0.0)
    }
}

impl SimilarityScorer for EmbeddingScorer {
    fn score(&self, query: &str, memory: &Memory) -> f32 {
        match self.query_vector(query) {
            Some(q) => self.against(&q, memory),
            None => 0.0,
        }
    }

    /// 查询向量每次检索只计算一次
    fn score_all(&self, query: &str, memories: &[&Memory]) -> Vec<f32> {
        match self.query_vector(query) {
            Some(q) => memories.iter().map(|m| self.against(&q, m)).collect(),
            None => vec![0.0; memories.len()],
        }
    }
}
