// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::promotion::PromotionRecord;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 晋升记录仓库接口
#[async_trait]
pub trait PromotionRepository: Send + Sync {
    /// 创建晋升记录
    async fn create(&self, record: &PromotionRecord) -> Result<PromotionRecord, RepositoryError>;

    /// 列出来源的晋升记录
    async fn list_for_source(
        &self,
        source_id: Uuid,
    ) -> Result<Vec<PromotionRecord>, RepositoryError>;
}
