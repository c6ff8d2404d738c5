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

/// 来源实体
///
/// 表示一个被监控的站点。来源由人工添加（active）或由编排器
/// 在补缺搜索中注册（candidate），随后经进化循环评估并晋升为
/// 永久监控任务。来源从不被删除，退役与淘汰只改变状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// 来源唯一标识符
    pub id: Uuid,
    /// 站点根URL
    pub root_url: String,
    /// 发现模式，auto在每次运行时解析为具体策略
    pub discovery_mode: DiscoveryMode,
    /// 递归爬取的深度上限
    pub crawl_depth_limit: i32,
    /// 来源状态
    pub status: SourceStatus,
    /// 调度间隔（秒），仅在active或promoted状态下有意义
    pub schedule_interval_secs: Option<i64>,
    /// 上次运行时间
    pub last_run_at: Option<DateTime<FixedOffset>>,
    /// 连续发现失败次数
    pub consecutive_failures: i32,
    /// 进入评估状态的时间，用于计算评估窗口
    pub evaluation_started_at: Option<DateTime<FixedOffset>>,
    /// 促成注册的原始查询（候选来源），晋升记录会引用它
    pub originating_query: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 发现模式枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// 被动模式：仅解析sitemap
    Sitemap,
    /// 主动模式：广度优先递归爬取
    Recursive,
    /// 自动：先探测sitemap，失败后回退递归
    #[default]
    Auto,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiscoveryMode::Sitemap => write!(f, "sitemap"),
            DiscoveryMode::Recursive => write!(f, "recursive"),
            DiscoveryMode::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for DiscoveryMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sitemap" => Ok(DiscoveryMode::Sitemap),
            "recursive" => Ok(DiscoveryMode::Recursive),
            "auto" => Ok(DiscoveryMode::Auto),
            _ => Err(()),
        }
    }
}

/// 来源状态枚举
///
/// 进化循环路径：Candidate → Evaluating → Promoted / Discarded。
/// 人工添加的来源直接进入Active。晋升是单调的：Promoted只能
/// 因连续失败或操作员动作转为Paused / Retired，不会自动回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// 候选：由即席搜索发现，尚无富化产出
    #[default]
    Candidate,
    /// 评估中：至少有一篇文档富化成功，价值信号累计中
    Evaluating,
    /// 已晋升：获得永久的周期调度
    Promoted,
    /// 活跃：人工添加的常规来源
    Active,
    /// 已暂停：操作员动作或连续失败
    Paused,
    /// 已退役：归档，不再调度
    Retired,
    /// 已淘汰：评估窗口结束仍未达到阈值
    Discarded,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceStatus::Candidate => write!(f, "candidate"),
            SourceStatus::Evaluating => write!(f, "evaluating"),
            SourceStatus::Promoted => write!(f, "promoted"),
            SourceStatus::Active => write!(f, "active"),
            SourceStatus::Paused => write!(f, "paused"),
            SourceStatus::Retired => write!(f, "retired"),
            SourceStatus::Discarded => write!(f, "discarded"),
        }
    }
}

impl FromStr for SourceStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candidate" => Ok(SourceStatus::Candidate),
            "evaluating" => Ok(SourceStatus::Evaluating),
            "promoted" => Ok(SourceStatus::Promoted),
            "active" => Ok(SourceStatus::Active),
            "paused" => Ok(SourceStatus::Paused),
            "retired" => Ok(SourceStatus::Retired),
            "discarded" => Ok(SourceStatus::Discarded),
            _ => Err(()),
        }
    }
}

impl Source {
    /// 创建人工添加的来源
    ///
    /// # 参数
    ///
    /// * `root_url` - 站点根URL
    /// * `mode` - 发现模式
    /// * `depth_limit` - 递归深度上限
    /// * `interval_secs` - 调度间隔
    pub fn new_manual(
        root_url: String,
        mode: DiscoveryMode,
        depth_limit: i32,
        interval_secs: i64,
    ) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            root_url,
            discovery_mode: mode,
            crawl_depth_limit: depth_limit,
            status: SourceStatus::Active,
            schedule_interval_secs: Some(interval_secs),
            last_run_at: None,
            consecutive_failures: 0,
            evaluation_started_at: None,
            originating_query: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 创建即席搜索发现的候选来源
    pub fn new_candidate(root_url: String, depth_limit: i32, originating_query: Option<String>) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            root_url,
            discovery_mode: DiscoveryMode::Auto,
            crawl_depth_limit: depth_limit,
            status: SourceStatus::Candidate,
            schedule_interval_secs: None,
            last_run_at: None,
            consecutive_failures: 0,
            evaluation_started_at: None,
            originating_query,
            created_at: now,
            updated_at: now,
        }
    }

    /// 候选来源进入评估状态
    ///
    /// 在第一篇文档富化成功后调用
    pub fn begin_evaluation(mut self) -> Result<Self, DomainError> {
        match self.status {
            SourceStatus::Candidate => {
                self.status = SourceStatus::Evaluating;
                self.evaluation_started_at = Some(Utc::now().into());
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 晋升为永久监控来源
    ///
    /// # 参数
    ///
    /// * `interval_secs` - 分配的周期调度间隔
    pub fn promote(mut self, interval_secs: i64) -> Result<Self, DomainError> {
        match self.status {
            SourceStatus::Evaluating => {
                self.status = SourceStatus::Promoted;
                self.schedule_interval_secs = Some(interval_secs);
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 评估窗口结束仍未达标，淘汰来源
    pub fn discard(mut self) -> Result<Self, DomainError> {
        match self.status {
            SourceStatus::Candidate | SourceStatus::Evaluating => {
                self.status = SourceStatus::Discarded;
                self.schedule_interval_secs = None;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 暂停来源（操作员动作或连续失败触发）
    pub fn pause(mut self) -> Result<Self, DomainError> {
        match self.status {
            SourceStatus::Active | SourceStatus::Promoted | SourceStatus::Evaluating => {
                self.status = SourceStatus::Paused;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 退役来源（归档保留，不删除）
    pub fn retire(mut self) -> Result<Self, DomainError> {
        match self.status {
            SourceStatus::Discarded | SourceStatus::Retired => {
                Err(DomainError::InvalidStateTransition)
            }
            _ => {
                self.status = SourceStatus::Retired;
                self.schedule_interval_secs = None;
                self.updated_at = Utc::now().into();
                Ok(self)
            }
        }
    }

    /// 是否参与周期调度
    pub fn is_scheduled(&self) -> bool {
        matches!(self.status, SourceStatus::Active | SourceStatus::Promoted)
            && self.schedule_interval_secs.is_some()
    }

    /// 判断来源是否到期应当运行
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_scheduled() {
            return false;
        }
        let interval = self.schedule_interval_secs.unwrap_or(0);
        match self.last_run_at {
            None => true,
            Some(last) => (now - last.with_timezone(&Utc)).num_seconds() >= interval,
        }
    }

    /// 记录一次成功运行
    pub fn record_run(&mut self) {
        self.last_run_at = Some(Utc::now().into());
        self.consecutive_failures = 0;
        self.updated_at = Utc::now().into();
    }

    /// 记录一次发现失败
    pub fn record_failure(&mut self) {
        self.last_run_at = Some(Utc::now().into());
        self.consecutive_failures += 1;
        self.updated_at = Utc::now().into();
    }
}
