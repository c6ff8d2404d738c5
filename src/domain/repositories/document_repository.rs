// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::document::{Document, EnrichmentStatus};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 文档仓库接口
///
/// 文档表是幂等处理的唯一事实来源。富化状态的写入
/// 必须以内容哈希做比较交换，防止两个工作器并发富化
/// 同一篇未变化的文档。
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// 插入文档桩；(source_id, url)已存在时返回现有记录
    async fn upsert_stub(&self, document: &Document) -> Result<Document, RepositoryError>;

    /// 按ID查找文档
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, RepositoryError>;

    /// 按(来源, URL)查找文档
    async fn find_by_source_and_url(
        &self,
        source_id: Uuid,
        url: &str,
    ) -> Result<Option<Document>, RepositoryError>;

    /// 判断URL是否已在任何来源下出现过（补缺去重）
    async fn url_exists(&self, url: &str) -> Result<bool, RepositoryError>;

    /// 更新文档（提取结果、哈希、状态）
    async fn update(&self, document: &Document) -> Result<Document, RepositoryError>;

    /// 以内容哈希为条件的富化状态比较交换
    ///
    /// 仅当文档当前的content_hash与expected_hash一致时更新
    /// 富化状态，返回受影响的行数。0行说明状态已过期，调用方
    /// 必须放弃本次写入并保留原状态。
    async fn set_enrichment_status_cas(
        &self,
        id: Uuid,
        expected_hash: &str,
        status: EnrichmentStatus,
    ) -> Result<u64, RepositoryError>;

    /// 统计来源下富化完成的文档数
    async fn count_enriched_for_source(&self, source_id: Uuid) -> Result<u64, RepositoryError>;
}
