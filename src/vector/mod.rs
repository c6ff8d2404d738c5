// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// 向量存储错误类型
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Vector store error: {0}")]
    Internal(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// 带相似度分数的检索结果
#[derive(Debug, Clone)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f32,
}

/// 向量存储接口
///
/// 核心只依赖两个操作：写入与相似度检索。
/// 读写可见性要求是最终一致即可。
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 写入或覆盖一条向量
    async fn upsert(
        &self,
        id: Uuid,
        embedding: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Result<(), VectorStoreError>;

    /// 余弦相似度检索，返回按分数降序的前k条
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>, VectorStoreError>;
}

/// 进程内向量存储实现
///
/// 哈希表加读写锁，余弦相似度暴力扫描。
/// 文档量在万级以内时足够，超出后换外部向量库。
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<Uuid, (Vec<f32>, serde_json::Value)>>,
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        id: Uuid,
        embedding: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Result<(), VectorStoreError> {
        if embedding.is_empty() {
            return Err(VectorStoreError::Internal("empty embedding".to_string()));
        }
        self.entries.write().insert(id, (embedding, metadata));
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>, VectorStoreError> {
        let entries = self.entries.read();
        let mut scored: Vec<ScoredId> = entries
            .iter()
            .filter_map(|(id, (embedding, _))| {
                cosine_similarity(query, embedding).map(|score| ScoredId { id: *id, score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// 余弦相似度；维度不同或零向量时返回None
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_search_ranking() {
        let store = InMemoryVectorStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store
            .upsert(a, vec![1.0, 0.0, 0.0], serde_json::json!({}))
            .await
            .unwrap();
        store
            .upsert(b, vec![0.0, 1.0, 0.0], serde_json::json!({}))
            .await
            .unwrap();

        let results = store.search(&[0.9, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, a);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = InMemoryVectorStore::new();
        let id = Uuid::new_v4();
        store
            .upsert(id, vec![1.0, 0.0], serde_json::json!({}))
            .await
            .unwrap();
        store
            .upsert(id, vec![0.0, 1.0], serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        let results = store.search(&[0.0, 1.0], 1).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).is_none());
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
    }
}
