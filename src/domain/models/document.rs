// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 文档实体
///
/// (source_id, url)对全局唯一。内容哈希用于幂等处理：
/// 哈希未变化的文档不会再次进入富化阶段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// 文档唯一标识符
    pub id: Uuid,
    /// 所属来源ID
    pub source_id: Uuid,
    /// 文档URL（规范化后）
    pub url: String,
    /// 提取后正文的SHA-256哈希
    pub content_hash: Option<String>,
    /// 标题
    pub title: Option<String>,
    /// 提取后的正文
    pub text: Option<String>,
    /// 页面声明的发布时间
    pub published_at: Option<DateTime<FixedOffset>>,
    /// 提取状态
    pub extraction_status: ExtractionStatus,
    /// 富化状态
    pub enrichment_status: EnrichmentStatus,
    /// 上次抓取时间
    pub fetched_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 提取状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// 等待抓取与提取
    #[default]
    Pending,
    /// 提取成功
    Extracted,
    /// 提取失败
    Failed,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExtractionStatus::Pending => write!(f, "pending"),
            ExtractionStatus::Extracted => write!(f, "extracted"),
            ExtractionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExtractionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExtractionStatus::Pending),
            "extracted" => Ok(ExtractionStatus::Extracted),
            "failed" => Ok(ExtractionStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 富化状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// 等待富化
    #[default]
    Pending,
    /// 富化完成
    Enriched,
    /// 富化失败（瀑布耗尽且重试用完）
    Failed,
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EnrichmentStatus::Pending => write!(f, "pending"),
            EnrichmentStatus::Enriched => write!(f, "enriched"),
            EnrichmentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for EnrichmentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrichmentStatus::Pending),
            "enriched" => Ok(EnrichmentStatus::Enriched),
            "failed" => Ok(EnrichmentStatus::Failed),
            _ => Err(()),
        }
    }
}

impl Document {
    /// 创建文档桩
    ///
    /// 发现运行结束时，被接受的URL物化为文档桩等待抓取
    pub fn stub(source_id: Uuid, url: String) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            source_id,
            url,
            content_hash: None,
            title: None,
            text: None,
            published_at: None,
            extraction_status: ExtractionStatus::Pending,
            enrichment_status: EnrichmentStatus::Pending,
            fetched_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 判断给定哈希是否与已存内容相同（幂等跳过的依据）
    pub fn is_unchanged(&self, hash: &str) -> bool {
        self.content_hash.as_deref() == Some(hash)
    }
}
