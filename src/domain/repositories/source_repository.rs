// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::source::{Source, SourceStatus};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 来源仓库接口
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// 创建来源
    async fn create(&self, source: &Source) -> Result<Source, RepositoryError>;

    /// 按ID查找来源
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Source>, RepositoryError>;

    /// 按根URL查找来源
    async fn find_by_root_url(&self, root_url: &str) -> Result<Option<Source>, RepositoryError>;

    /// 更新来源
    async fn update(&self, source: &Source) -> Result<Source, RepositoryError>;

    /// 列出指定状态的来源；None表示全部
    async fn list(&self, status: Option<SourceStatus>) -> Result<Vec<Source>, RepositoryError>;

    /// 查找到期应当运行的来源（active/promoted且间隔已过）
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Source>, RepositoryError>;
}
