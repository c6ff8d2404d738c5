// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::DiscoverySettings;
use crate::discovery::crawler::{CrawlLimits, Crawler};
use crate::discovery::sitemap::SitemapProbe;
use crate::discovery::DiscoveryError;
use crate::domain::models::frontier::{FrontierEntry, UrlClass};
use crate::domain::models::source::{DiscoveryMode, Source};
use crate::engines::Fetcher;
use crate::utils::robots::RobotsChecker;
use crate::utils::url_utils;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// 本次运行实际采用的策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChosenStrategy {
    /// 被动：sitemap解析
    Sitemap,
    /// 主动：广度优先爬取
    Recursive,
}

/// 一次发现运行的报告
#[derive(Debug)]
pub struct DiscoveryReport {
    /// 采用的策略
    pub strategy: ChosenStrategy,
    /// 去重后的前沿条目
    pub entries: Vec<FrontierEntry>,
    /// 抓取的页面数（sitemap策略下为sitemap文件数近似值）
    pub pages_fetched: usize,
    /// 是否因预算或截止时间提前结束
    pub truncated: bool,
}

impl DiscoveryReport {
    /// 取出被接受的内容URL（物化为文档桩的集合）
    pub fn content_urls(&self) -> Vec<&FrontierEntry> {
        self.entries
            .iter()
            .filter(|e| e.classification == UrlClass::Content)
            .collect()
    }
}

/// 发现策略选择器
///
/// auto模式在每次运行开始时解析一次为具体策略：先做sitemap
/// 探测，探测失败或没有新鲜条目才回退到递归爬取。同一运行
/// 内不会再切换策略。
pub struct DiscoveryEngine {
    fetcher: Arc<Fetcher>,
    robots: Arc<RobotsChecker>,
    settings: DiscoverySettings,
}

impl DiscoveryEngine {
    pub fn new(
        fetcher: Arc<Fetcher>,
        robots: Arc<RobotsChecker>,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            fetcher,
            robots,
            settings,
        }
    }

    /// 为来源执行一次发现运行
    ///
    /// # 参数
    ///
    /// * `source` - 目标来源
    /// * `force_mode` - 操作员强制覆盖的模式（仅本次运行有效）
    pub async fn run(
        &self,
        source: &Source,
        force_mode: Option<DiscoveryMode>,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let mode = force_mode.unwrap_or(source.discovery_mode);
        info!(
            "Discovery run for {} (mode {}, depth limit {})",
            source.root_url, mode, source.crawl_depth_limit
        );

        match mode {
            DiscoveryMode::Sitemap => self.run_sitemap(&source.root_url).await,
            DiscoveryMode::Recursive => self.run_recursive(source).await,
            DiscoveryMode::Auto => {
                // sitemap永远先行，递归只在探测失败时运行
                match self.run_sitemap(&source.root_url).await {
                    Ok(report) => Ok(report),
                    Err(DiscoveryError::SitemapProbeFailed) => {
                        warn!(
                            "Sitemap probe failed for {}, falling back to recursive crawl",
                            source.root_url
                        );
                        self.run_recursive(source).await
                    }
                    Err(other) => Err(other),
                }
            }
        }
    }

    async fn run_sitemap(&self, root_url: &str) -> Result<DiscoveryReport, DiscoveryError> {
        let probe = SitemapProbe::new(
            &self.fetcher,
            &self.robots,
            self.settings.sitemap_recency_secs,
            self.settings.sitemap_fetch_budget,
            &self.settings.sitemap_priority_terms,
            &self.settings.sitemap_skip_terms,
        );

        let sitemap_entries = probe.probe(root_url).await?;
        let root = Url::parse(root_url)
            .map_err(|e| DiscoveryError::InvalidRoot(format!("{}: {}", root_url, e)))?;

        // sitemap条目同样经过排除过滤与同域约束，按规范化URL去重
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();
        for entry in sitemap_entries {
            let Ok(url) = Url::parse(&entry.url) else {
                continue;
            };
            if !url_utils::same_registrable_domain(&url, &root) {
                continue;
            }
            if !crate::discovery::crawler::is_useful_link(
                url.as_str(),
                &self.settings.exclude_patterns,
            ) {
                continue;
            }
            let normalized = url_utils::normalize_url(&url);
            if seen.insert(normalized.clone()) {
                entries.push(FrontierEntry::new(
                    normalized,
                    Some(root_url.to_string()),
                    0,
                    UrlClass::Content,
                ));
            }
        }

        if entries.is_empty() {
            return Err(DiscoveryError::SitemapProbeFailed);
        }

        Ok(DiscoveryReport {
            strategy: ChosenStrategy::Sitemap,
            pages_fetched: 0,
            truncated: false,
            entries,
        })
    }

    async fn run_recursive(&self, source: &Source) -> Result<DiscoveryReport, DiscoveryError> {
        let limits = CrawlLimits {
            depth_limit: source.crawl_depth_limit.max(0) as u32,
            page_budget: self.settings.page_budget,
            deadline: Duration::from_secs(self.settings.deadline_secs),
            concurrency: self.settings.concurrency.max(1),
            navigation_link_threshold: self.settings.navigation_link_threshold,
        };
        let crawler = Crawler::new(&self.fetcher, &self.settings.exclude_patterns, limits);
        let outcome = crawler.crawl(&source.root_url).await?;

        Ok(DiscoveryReport {
            strategy: ChosenStrategy::Recursive,
            entries: outcome.entries,
            pages_fetched: outcome.pages_fetched,
            truncated: outcome.truncated,
        })
    }
}
