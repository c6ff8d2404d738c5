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

use crate::domain::models::document::{Document, EnrichmentStatus};
use crate::domain::repositories::document_repository::DocumentRepository;
use crate::infrastructure::database::entities::document as document_entity;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 文档仓库实现
#[derive(Clone)]
pub struct DocumentRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl DocumentRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<document_entity::Model> for Document {
    fn from(model: document_entity::Model) -> Self {
        Self {
            id: model.id,
            source_id: model.source_id,
            url: model.url,
            content_hash: model.content_hash,
            title: model.title,
            text: model.text,
            published_at: model.published_at,
            extraction_status: model.extraction_status.parse().unwrap_or_default(),
            enrichment_status: model.enrichment_status.parse().unwrap_or_default(),
            fetched_at: model.fetched_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Document> for document_entity::ActiveModel {
    fn from(document: Document) -> Self {
        Self {
            id: Set(document.id),
            source_id: Set(document.source_id),
            url: Set(document.url.clone()),
            content_hash: Set(document.content_hash.clone()),
            title: Set(document.title.clone()),
            text: Set(document.text.clone()),
            published_at: Set(document.published_at),
            extraction_status: Set(document.extraction_status.to_string()),
            enrichment_status: Set(document.enrichment_status.to_string()),
            fetched_at: Set(document.fetched_at),
            created_at: Set(document.created_at),
            updated_at: Set(document.updated_at),
        }
    }
}

#[async_trait]
impl DocumentRepository for DocumentRepositoryImpl {
    async fn upsert_stub(&self, document: &Document) -> Result<Document, RepositoryError> {
        // (source_id, url)唯一约束：冲突时什么都不写，读回现有行
        let model: document_entity::ActiveModel = document.clone().into();
        let insert = document_entity::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    document_entity::Column::SourceId,
                    document_entity::Column::Url,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(self.db.as_ref())
            .await;

        match insert {
            Ok(_) => {}
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e.into()),
        }

        self.find_by_source_and_url(document.source_id, &document.url)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        let model = document_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_source_and_url(
        &self,
        source_id: Uuid,
        url: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let model = document_entity::Entity::find()
            .filter(document_entity::Column::SourceId.eq(source_id))
            .filter(document_entity::Column::Url.eq(url))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn url_exists(&self, url: &str) -> Result<bool, RepositoryError> {
        let count = document_entity::Entity::find()
            .filter(document_entity::Column::Url.eq(url))
            .count(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    async fn update(&self, document: &Document) -> Result<Document, RepositoryError> {
        let model: document_entity::ActiveModel = document.clone().into();
        let updated = model.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    async fn set_enrichment_status_cas(
        &self,
        id: Uuid,
        expected_hash: &str,
        status: EnrichmentStatus,
    ) -> Result<u64, RepositoryError> {
        // 内容哈希上的比较交换：哈希不匹配时0行受影响，
        // 调用方必须放弃写入（原状态保留）
        let result = document_entity::Entity::update_many()
            .col_expr(
                document_entity::Column::EnrichmentStatus,
                Expr::value(status.to_string()),
            )
            .col_expr(
                document_entity::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::ChronoDateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(document_entity::Column::Id.eq(id))
            .filter(document_entity::Column::ContentHash.eq(expected_hash))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn count_enriched_for_source(&self, source_id: Uuid) -> Result<u64, RepositoryError> {
        let count = document_entity::Entity::find()
            .filter(document_entity::Column::SourceId.eq(source_id))
            .filter(
                document_entity::Column::EnrichmentStatus
                    .eq(EnrichmentStatus::Enriched.to_string()),
            )
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
