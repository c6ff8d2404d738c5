// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{Task, TaskStatus};
use crate::domain::repositories::task_repository::TaskRepository;
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Worker trait定义
///
/// 所有后台工作器都必须实现此trait
#[async_trait]
pub trait Worker: Send + Sync {
    /// 运行工作器（循环拉取直到被中止）
    async fn run(&self) -> Result<(), WorkerError>;

    /// 获取工作器名称
    fn name(&self) -> &str;
}

/// 任务失败的统一处理：带退避重新入队，重试用尽则停放
///
/// 领取任务时attempt_count已经加一，这里直接以它计算退避。
/// 停放（Failed）的任务留给操作员检视，不会再被自动领取。
pub async fn retry_or_park(
    mut task: Task,
    repository: &Arc<dyn TaskRepository>,
    policy: &RetryPolicy,
) -> Result<(), WorkerError> {
    if task.can_retry() {
        let delay = policy.calculate_backoff(task.attempt_count.max(1) as u32);
        warn!(
            "Task {} failed (attempt {}/{}), requeueing in {:?}",
            task.id, task.attempt_count, task.max_retries, delay
        );
        task.status = TaskStatus::Queued;
        task.scheduled_at = Some(policy.next_retry_time(task.attempt_count.max(1) as u32, Utc::now()).into());
        task.started_at = None;
        task.lock_token = None;
        task.lock_expires_at = None;
        task.updated_at = Utc::now().into();
        repository.update(&task).await?;
    } else {
        info!(
            "Task {} parked after {} attempts, awaiting operator review",
            task.id, task.attempt_count
        );
        repository.mark_failed(task.id).await?;
    }
    Ok(())
}
