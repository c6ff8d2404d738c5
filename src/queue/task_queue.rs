// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::task_repository::TaskRepository;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 队列为空
    #[error("Queue empty")]
    Empty,
}

/// 任务队列特质
///
/// 发现、抓取与富化是相互独立的队列阶段；
/// 入队到某一阶段的条目就是该阶段的重试单元
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError>;

    /// 出队指定阶段的任务
    async fn dequeue(&self, worker_id: Uuid, task_type: TaskType)
        -> Result<Option<Task>, QueueError>;

    /// 完成任务
    async fn complete(&self, task_id: Uuid) -> Result<(), QueueError>;

    /// 失败任务
    async fn fail(&self, task_id: Uuid) -> Result<(), QueueError>;
}

/// 基于任务仓库的队列实现
///
/// 持久化队列：任务表就是队列本体，原子领取由仓库的
/// SKIP LOCKED查询保证
pub struct PostgresTaskQueue<R: TaskRepository> {
    repository: Arc<R>,
}

impl<R: TaskRepository> PostgresTaskQueue<R> {
    /// 创建新的队列实例
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: TaskRepository> TaskQueue for PostgresTaskQueue<R> {
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError> {
        let created = self.repository.create(&task).await?;
        Ok(created)
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>, QueueError> {
        let task = self.repository.acquire_next(worker_id, task_type).await?;
        Ok(task)
    }

    async fn complete(&self, task_id: Uuid) -> Result<(), QueueError> {
        self.repository.mark_completed(task_id).await?;
        Ok(())
    }

    async fn fail(&self, task_id: Uuid) -> Result<(), QueueError> {
        self.repository.mark_failed(task_id).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn enqueue(&self, task: Task) -> Result<Task, QueueError> {
        (**self).enqueue(task).await
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>, QueueError> {
        (**self).dequeue(worker_id, task_type).await
    }

    async fn complete(&self, task_id: Uuid) -> Result<(), QueueError> {
        (**self).complete(task_id).await
    }

    async fn fail(&self, task_id: Uuid) -> Result<(), QueueError> {
        (**self).fail(task_id).await
    }
}
