// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::enrichment::EnrichmentResult;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 富化结果仓库接口
///
/// 每篇文档只保留一条当前结果：upsert按document_id覆盖
#[async_trait]
pub trait EnrichmentRepository: Send + Sync {
    /// 写入或覆盖文档的富化结果
    async fn upsert(&self, result: &EnrichmentResult) -> Result<EnrichmentResult, RepositoryError>;

    /// 按文档ID查找结果
    async fn find_by_document(
        &self,
        document_id: Uuid,
    ) -> Result<Option<EnrichmentResult>, RepositoryError>;

    /// 批量按文档ID查找结果（综合阶段取上下文）
    async fn find_by_documents(
        &self,
        document_ids: &[Uuid],
    ) -> Result<Vec<EnrichmentResult>, RepositoryError>;

    /// 统计来源在时间窗口内的高紧急度文档数（价值信号）
    async fn count_high_urgency_for_source(
        &self,
        source_id: Uuid,
        urgency_floor: i32,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}
