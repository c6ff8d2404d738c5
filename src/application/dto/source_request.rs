// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 创建来源请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSourceDto {
    /// 站点根URL
    #[validate(url(message = "root_url must be a valid URL"))]
    pub root_url: String,
    /// 发现模式：sitemap / recursive / auto（默认auto）
    pub discovery_mode: Option<String>,
    /// 递归深度上限
    #[validate(range(min = 0, max = 5))]
    pub crawl_depth_limit: Option<i32>,
    /// 调度间隔（秒）
    #[validate(range(min = 60))]
    pub schedule_interval_secs: Option<i64>,
}

/// 手动触发发现运行的请求
#[derive(Debug, Default, Deserialize)]
pub struct TriggerDiscoveryDto {
    /// 单次运行的强制模式覆盖：sitemap / recursive / auto
    pub force_mode: Option<String>,
}

/// 来源视图
#[derive(Debug, Serialize)]
pub struct SourceView {
    pub id: uuid::Uuid,
    pub root_url: String,
    pub discovery_mode: String,
    pub status: String,
    pub crawl_depth_limit: i32,
    pub schedule_interval_secs: Option<i64>,
    pub last_run_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub consecutive_failures: i32,
}

impl From<crate::domain::models::source::Source> for SourceView {
    fn from(source: crate::domain::models::source::Source) -> Self {
        Self {
            id: source.id,
            root_url: source.root_url,
            discovery_mode: source.discovery_mode.to_string(),
            status: source.status.to_string(),
            crawl_depth_limit: source.crawl_depth_limit,
            schedule_interval_secs: source.schedule_interval_secs,
            last_run_at: source.last_run_at,
            consecutive_failures: source.consecutive_failures,
        }
    }
}
