// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::promotion::PromotionRecord;
use crate::domain::repositories::promotion_repository::PromotionRepository;
use crate::infrastructure::database::entities::promotion_record as promotion_entity;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 晋升记录仓库实现
#[derive(Clone)]
pub struct PromotionRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl PromotionRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<promotion_entity::Model> for PromotionRecord {
    fn from(model: promotion_entity::Model) -> Self {
        Self {
            id: model.id,
            source_id: model.source_id,
            originating_query: model.originating_query,
            value_score: model.value_score,
            created_at: model.created_at,
        }
    }
}

impl From<PromotionRecord> for promotion_entity::ActiveModel {
    fn from(record: PromotionRecord) -> Self {
        Self {
            id: Set(record.id),
            source_id: Set(record.source_id),
            originating_query: Set(record.originating_query.clone()),
            value_score: Set(record.value_score),
            created_at: Set(record.created_at),
        }
    }
}

#[async_trait]
impl PromotionRepository for PromotionRepositoryImpl {
    async fn create(&self, record: &PromotionRecord) -> Result<PromotionRecord, RepositoryError> {
        let model: promotion_entity::ActiveModel = record.clone().into();
        model.insert(self.db.as_ref()).await?;
        Ok(record.clone())
    }

    async fn list_for_source(
        &self,
        source_id: Uuid,
    ) -> Result<Vec<PromotionRecord>, RepositoryError> {
        let models = promotion_entity::Entity::find()
            .filter(promotion_entity::Column::SourceId.eq(source_id))
            .order_by_desc(promotion_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}
