// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::enrichment::EnrichmentResult;
use crate::domain::repositories::enrichment_repository::EnrichmentRepository;
use crate::infrastructure::database::entities::{
    document as document_entity, enrichment_result as enrichment_entity,
};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QuerySelect, RelationTrait, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 富化结果仓库实现
#[derive(Clone)]
pub struct EnrichmentRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl EnrichmentRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<enrichment_entity::Model> for EnrichmentResult {
    fn from(model: enrichment_entity::Model) -> Self {
        let tags: Vec<String> = serde_json::from_value(model.tags).unwrap_or_default();
        Self {
            document_id: model.document_id,
            provider: model.provider,
            urgency: model.urgency,
            category: model.category,
            summary: model.summary,
            tags,
            embedding_ref: model.embedding_ref,
            enriched_at: model.enriched_at,
        }
    }
}

impl From<EnrichmentResult> for enrichment_entity::ActiveModel {
    fn from(result: EnrichmentResult) -> Self {
        Self {
            document_id: Set(result.document_id),
            provider: Set(result.provider.clone()),
            urgency: Set(result.urgency),
            category: Set(result.category.clone()),
            summary: Set(result.summary.clone()),
            tags: Set(serde_json::json!(result.tags)),
            embedding_ref: Set(result.embedding_ref),
            enriched_at: Set(result.enriched_at),
        }
    }
}

#[async_trait]
impl EnrichmentRepository for EnrichmentRepositoryImpl {
    async fn upsert(&self, result: &EnrichmentResult) -> Result<EnrichmentResult, RepositoryError> {
        // 每篇文档一条当前结果：主键冲突时整行覆盖
        let model: enrichment_entity::ActiveModel = result.clone().into();
        enrichment_entity::Entity::insert(model)
            .on_conflict(
                OnConflict::column(enrichment_entity::Column::DocumentId)
                    .update_columns([
                        enrichment_entity::Column::Provider,
                        enrichment_entity::Column::Urgency,
                        enrichment_entity::Column::Category,
                        enrichment_entity::Column::Summary,
                        enrichment_entity::Column::Tags,
                        enrichment_entity::Column::EmbeddingRef,
                        enrichment_entity::Column::EnrichedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(result.clone())
    }

    async fn find_by_document(
        &self,
        document_id: Uuid,
    ) -> Result<Option<EnrichmentResult>, RepositoryError> {
        let model = enrichment_entity::Entity::find_by_id(document_id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_documents(
        &self,
        document_ids: &[Uuid],
    ) -> Result<Vec<EnrichmentResult>, RepositoryError> {
        if document_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = enrichment_entity::Entity::find()
            .filter(enrichment_entity::Column::DocumentId.is_in(document_ids.iter().copied()))
            .all(self.db.as_ref())
            .await?;

        // 调用方按相似度排序传入，这里恢复同样的顺序
        let mut by_id: std::collections::HashMap<Uuid, EnrichmentResult> = models
            .into_iter()
            .map(|m| (m.document_id, m.into()))
            .collect();
        Ok(document_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    async fn count_high_urgency_for_source(
        &self,
        source_id: Uuid,
        urgency_floor: i32,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let count = enrichment_entity::Entity::find()
            .join(JoinType::InnerJoin, enrichment_entity::Relation::Document.def())
            .filter(document_entity::Column::SourceId.eq(source_id))
            .filter(enrichment_entity::Column::Urgency.gte(urgency_floor))
            .filter(enrichment_entity::Column::EnrichedAt.gte(since))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
