// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 发现模块
///
/// 发现策略选择器：被动sitemap解析与主动递归爬取
pub mod crawler;
pub mod sitemap;
pub mod strategy;

use thiserror::Error;

/// 发现错误类型
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// 根URL不可达，本次运行致命（不产出部分前沿）
    #[error("Root URL unreachable: {0}")]
    RootUnreachable(String),

    /// 根URL无法解析
    #[error("Invalid root URL: {0}")]
    InvalidRoot(String),

    /// sitemap探测失败（无sitemap或没有新鲜条目）
    #[error("Sitemap probe failed")]
    SitemapProbeFailed,

    /// 内部错误
    #[error("Discovery internal error: {0}")]
    Internal(String),
}

pub use crawler::is_useful_link;
pub use strategy::{ChosenStrategy, DiscoveryEngine, DiscoveryReport};
