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

use crate::domain::models::source::{Source, SourceStatus};
use crate::domain::repositories::source_repository::SourceRepository;
use crate::infrastructure::database::entities::source as source_entity;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 来源仓库实现
#[derive(Clone)]
pub struct SourceRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SourceRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<source_entity::Model> for Source {
    fn from(model: source_entity::Model) -> Self {
        Self {
            id: model.id,
            root_url: model.root_url,
            discovery_mode: model.discovery_mode.parse().unwrap_or_default(),
            crawl_depth_limit: model.crawl_depth_limit,
            status: model.status.parse().unwrap_or_default(),
            schedule_interval_secs: model.schedule_interval_secs,
            last_run_at: model.last_run_at,
            consecutive_failures: model.consecutive_failures,
            evaluation_started_at: model.evaluation_started_at,
            originating_query: model.originating_query,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<Source> for source_entity::ActiveModel {
    fn from(source: Source) -> Self {
        Self {
            id: Set(source.id),
            root_url: Set(source.root_url.clone()),
            discovery_mode: Set(source.discovery_mode.to_string()),
            crawl_depth_limit: Set(source.crawl_depth_limit),
            status: Set(source.status.to_string()),
            schedule_interval_secs: Set(source.schedule_interval_secs),
            last_run_at: Set(source.last_run_at),
            consecutive_failures: Set(source.consecutive_failures),
            evaluation_started_at: Set(source.evaluation_started_at),
            originating_query: Set(source.originating_query.clone()),
            created_at: Set(source.created_at),
            updated_at: Set(source.updated_at),
        }
    }
}

#[async_trait]
impl SourceRepository for SourceRepositoryImpl {
    async fn create(&self, source: &Source) -> Result<Source, RepositoryError> {
        let model: source_entity::ActiveModel = source.clone().into();
        model.insert(self.db.as_ref()).await?;
        Ok(source.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Source>, RepositoryError> {
        let model = source_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_root_url(&self, root_url: &str) -> Result<Option<Source>, RepositoryError> {
        let model = source_entity::Entity::find()
            .filter(source_entity::Column::RootUrl.eq(root_url))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn update(&self, source: &Source) -> Result<Source, RepositoryError> {
        let model: source_entity::ActiveModel = source.clone().into();
        let updated = model.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    async fn list(&self, status: Option<SourceStatus>) -> Result<Vec<Source>, RepositoryError> {
        let mut query = source_entity::Entity::find();
        if let Some(status) = status {
            query = query.filter(source_entity::Column::Status.eq(status.to_string()));
        }
        let models = query
            .order_by_asc(source_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Source>, RepositoryError> {
        // 间隔算术在内存里做，避免跨数据库的时间运算方言差异
        let models = source_entity::Entity::find()
            .filter(
                source_entity::Column::Status.is_in([
                    SourceStatus::Active.to_string(),
                    SourceStatus::Promoted.to_string(),
                ]),
            )
            .filter(source_entity::Column::ScheduleIntervalSecs.is_not_null())
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .map(Source::from)
            .filter(|source| source.is_due(now))
            .collect())
    }
}
