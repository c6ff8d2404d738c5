// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 富化结果实体
///
/// 每篇文档只保留一条当前结果，重新富化时覆盖而不追加
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// 所属文档ID（唯一）
    pub document_id: Uuid,
    /// 实际产出结果的提供商名称
    pub provider: String,
    /// 紧急度评分（1-10）
    pub urgency: i32,
    /// 类别（受控词表）
    pub category: String,
    /// 摘要（长度受限）
    pub summary: String,
    /// 标签（已去重）
    pub tags: Vec<String>,
    /// 向量存储中的键
    pub embedding_ref: Option<Uuid>,
    /// 富化时间
    pub enriched_at: DateTime<FixedOffset>,
}

impl EnrichmentResult {
    pub fn new(
        document_id: Uuid,
        provider: String,
        urgency: i32,
        category: String,
        summary: String,
        tags: Vec<String>,
    ) -> Self {
        Self {
            document_id,
            provider,
            urgency,
            category,
            summary,
            tags,
            embedding_ref: None,
            enriched_at: Utc::now().into(),
        }
    }
}
