// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 晋升记录实体
///
/// 将来源与当初促成其注册的查询关联起来，
/// 并记录跨越阈值时的价值信号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    /// 记录唯一标识符
    pub id: Uuid,
    /// 被晋升的来源ID
    pub source_id: Uuid,
    /// 促成注册的原始查询
    pub originating_query: Option<String>,
    /// 跨越阈值时的价值分（窗口内高紧急度文档数）
    pub value_score: i64,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

impl PromotionRecord {
    pub fn new(source_id: Uuid, originating_query: Option<String>, value_score: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            originating_query,
            value_score,
            created_at: Utc::now().into(),
        }
    }
}
