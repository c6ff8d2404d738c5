// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::DomainError;

/// 任务实体
///
/// 队列中的一个工作单元，对应流水线的一个阶段：发现、
/// 抓取+提取或富化。任务携带锁令牌与锁过期时间，
/// 工作器崩溃后锁过期的任务会被重新领取（至少一次语义）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 任务类型，对应流水线阶段
    pub task_type: TaskType,
    /// 任务状态
    pub status: TaskStatus,
    /// 任务优先级，数值越大优先级越高
    pub priority: i32,
    /// 关联的来源ID
    pub source_id: Option<Uuid>,
    /// 关联的文档ID
    pub document_id: Option<Uuid>,
    /// 目标URL
    pub url: String,
    /// 任务负载数据
    pub payload: serde_json::Value,
    /// 已尝试次数
    pub attempt_count: i32,
    /// 最大重试次数
    pub max_retries: i32,
    /// 计划执行时间
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    /// 过期时间，任务超过此时间将不再执行
    pub expires_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
    /// 锁定令牌
    pub lock_token: Option<Uuid>,
    /// 锁定过期时间（可见性超时）
    pub lock_expires_at: Option<DateTime<FixedOffset>>,
}

/// 任务类型枚举
///
/// 每种类型对应一个独立的队列阶段，由独立的工作器池消费
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// 发现任务：为来源解析URL前沿
    #[default]
    Discovery,
    /// 抓取+提取任务：处理单个文档URL
    Fetch,
    /// 富化任务：将文档送入提供商瀑布
    Enrich,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskType::Discovery => write!(f, "discovery"),
            TaskType::Fetch => write!(f, "fetch"),
            TaskType::Enrich => write!(f, "enrich"),
        }
    }
}

impl FromStr for TaskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(TaskType::Discovery),
            "fetch" => Ok(TaskType::Fetch),
            "enrich" => Ok(TaskType::Enrich),
            _ => Err(()),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Queued → Active → Completed/Failed/Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 已入队
    #[default]
    Queued,
    /// 活跃中
    Active,
    /// 已完成
    Completed,
    /// 已失败（重试用尽，等待操作员检视）
    Failed,
    /// 已取消
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "active" => Ok(TaskStatus::Active),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl Task {
    /// 创建一个新的任务
    ///
    /// # 参数
    ///
    /// * `task_type` - 任务类型
    /// * `url` - 目标URL
    /// * `payload` - 任务负载数据
    pub fn new(task_type: TaskType, url: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type,
            status: TaskStatus::Queued,
            priority: 0,
            source_id: None,
            document_id: None,
            url,
            payload,
            attempt_count: 0,
            max_retries: 3,
            scheduled_at: None,
            expires_at: None,
            created_at: Utc::now().into(),
            started_at: None,
            completed_at: None,
            updated_at: Utc::now().into(),
            lock_token: None,
            lock_expires_at: None,
        }
    }

    /// 创建发现任务
    pub fn discovery(source_id: Uuid, root_url: String, payload: serde_json::Value) -> Self {
        let mut task = Self::new(TaskType::Discovery, root_url, payload);
        task.source_id = Some(source_id);
        task
    }

    /// 创建抓取任务
    pub fn fetch(source_id: Uuid, document_id: Uuid, url: String) -> Self {
        let mut task = Self::new(TaskType::Fetch, url, serde_json::json!({}));
        task.source_id = Some(source_id);
        task.document_id = Some(document_id);
        task
    }

    /// 创建富化任务
    ///
    /// 负载记录入队时的内容哈希，富化工作器据此做CAS检查
    pub fn enrich(source_id: Uuid, document_id: Uuid, url: String, content_hash: &str) -> Self {
        let mut task = Self::new(
            TaskType::Enrich,
            url,
            serde_json::json!({ "content_hash": content_hash }),
        );
        task.source_id = Some(source_id);
        task.document_id = Some(document_id);
        task
    }

    /// 启动任务
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Queued => {
                self.status = TaskStatus::Active;
                self.started_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 完成任务
    pub fn complete(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Active => {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记任务失败
    pub fn fail(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Active => {
                self.status = TaskStatus::Failed;
                self.completed_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 取消任务
    pub fn cancel(mut self) -> Result<Self, DomainError> {
        match self.status {
            TaskStatus::Queued | TaskStatus::Active => {
                self.status = TaskStatus::Cancelled;
                self.completed_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 判断任务是否可以重试
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_retries
    }
}
