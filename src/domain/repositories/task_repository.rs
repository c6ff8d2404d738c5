// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus, TaskType};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 任务仓库接口
///
/// 任务表是队列的持久化形态。`acquire_next`必须使用
/// SELECT ... FOR UPDATE SKIP LOCKED之类的原子领取语义，
/// 保证同一任务不会被两个工作器同时持有。
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建任务
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError>;

    /// 按ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError>;

    /// 更新任务
    async fn update(&self, task: &Task) -> Result<Task, RepositoryError>;

    /// 原子领取指定阶段的下一个任务
    ///
    /// 领取时设置锁令牌与锁过期时间（可见性超时），
    /// 并将状态置为Active、尝试次数加一
    async fn acquire_next(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>, RepositoryError>;

    /// 标记任务完成
    async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 标记任务失败
    async fn mark_failed(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 重置锁已过期的Active任务为Queued（崩溃恢复）
    async fn reset_stuck_tasks(&self, timeout: chrono::Duration) -> Result<u64, RepositoryError>;

    /// 将超过expires_at的任务标记为Cancelled
    async fn expire_tasks(&self) -> Result<u64, RepositoryError>;

    /// 统计指定阶段、指定状态的任务数（队列深度视图）
    async fn count_by_status(
        &self,
        task_type: TaskType,
        status: TaskStatus,
    ) -> Result<u64, RepositoryError>;
}
