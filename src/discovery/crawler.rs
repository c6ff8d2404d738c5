// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::discovery::DiscoveryError;
use crate::domain::models::frontier::{FrontierEntry, UrlClass};
use crate::engines::{FetchError, Fetcher};
use crate::utils::url_utils;
use dashmap::DashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// 暗示列表页的URL关键词（继续下钻）
const INDEX_KEYWORDS: &[&str] = &[
    "blog", "news", "article", "post", "story", "feed", "category", "archive", "section",
];

/// 静态资源后缀，直接排除
const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".pdf", ".zip",
    ".mp3", ".mp4", ".avi", ".woff", ".woff2",
];

static DATE_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/20\d{2}/").expect("Failed to compile date path regex"));
static MONTH_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)/")
        .expect("Failed to compile month path regex")
});
static ID_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-/]\d{4,}(\.html)?$").expect("Failed to compile id path regex"));

/// URL形态分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    /// 文章（内容候选）
    Article,
    /// 列表页（继续扩展）
    Index,
    /// 无法判断
    Unknown,
}

/// 按URL路径形态分类链接
///
/// 日期或数字ID形态视为文章；含列表关键词的路径视为列表页。
/// 纯函数，保证同一运行内分类结果确定。
fn classify_path(path: &str) -> LinkKind {
    let lower = path.to_lowercase();

    if DATE_PATH_REGEX.is_match(&lower)
        || MONTH_PATH_REGEX.is_match(&lower)
        || ID_PATH_REGEX.is_match(&lower)
    {
        return LinkKind::Article;
    }

    for kw in INDEX_KEYWORDS {
        if lower.contains(&format!("/{}", kw)) {
            return LinkKind::Index;
        }
    }

    LinkKind::Unknown
}

/// 判断链接是否值得跟进
///
/// 过滤静态资源与配置的排除片段（广告、标签页、登录页等）
pub fn is_useful_link(url_str: &str, exclude_patterns: &[String]) -> bool {
    let lower = url_str.to_lowercase();

    if ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    if lower.contains('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return false;
    }
    !exclude_patterns.iter().any(|p| lower.contains(p.as_str()))
}

/// 递归爬取的运行边界
#[derive(Debug, Clone)]
pub struct CrawlLimits {
    /// 深度上限
    pub depth_limit: u32,
    /// 页面抓取预算
    pub page_budget: usize,
    /// 墙钟截止时间
    pub deadline: Duration,
    /// 页面抓取并发度
    pub concurrency: usize,
    /// 导航页判定的出链数阈值
    pub navigation_link_threshold: usize,
}

/// 爬取产出
#[derive(Debug)]
pub struct CrawlOutcome {
    /// 前沿条目（导航与内容，按规范化URL去重）
    pub entries: Vec<FrontierEntry>,
    /// 实际抓取的页面数
    pub pages_fetched: usize,
    /// 被排除的链接数
    pub excluded_links: usize,
    /// 是否因预算或截止时间提前结束
    pub truncated: bool,
}

/// 广度优先爬取器
///
/// 主动发现路径：显式队列加并发安全的访问集合，绝不在页面
/// 结构上直接递归（站点存在环）。根URL抓取失败对整次运行
/// 是致命的；之后的单链接失败只丢弃该链接。到达页面预算或
/// 截止时间时提前返回已收集的部分前沿，这不是错误。
pub struct Crawler<'a> {
    fetcher: &'a Fetcher,
    exclude_patterns: &'a [String],
    limits: CrawlLimits,
}

/// 单个页面的解析产物
struct ParsedPage {
    /// 页面出链总数（链接密度启发用）
    link_count: usize,
    /// 同域文章链接
    article_links: Vec<Url>,
    /// 同域列表页链接
    index_links: Vec<Url>,
    /// 被排除的链接数
    excluded: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(fetcher: &'a Fetcher, exclude_patterns: &'a [String], limits: CrawlLimits) -> Self {
        Self {
            fetcher,
            exclude_patterns,
            limits,
        }
    }

    /// 从根URL执行广度优先爬取
    pub async fn crawl(&self, root_url: &str) -> Result<CrawlOutcome, DiscoveryError> {
        let root = Url::parse(root_url)
            .map_err(|e| DiscoveryError::InvalidRoot(format!("{}: {}", root_url, e)))?;

        let visited: DashSet<String> = DashSet::new();
        visited.insert(url_utils::normalize_url(&root));

        let mut queue: VecDeque<(Url, u32, Option<String>)> = VecDeque::new();
        queue.push_back((root.clone(), 0, None));

        let mut entries: Vec<FrontierEntry> = Vec::new();
        let mut pages_fetched = 0usize;
        let mut excluded_links = 0usize;
        let mut truncated = false;
        let started = Instant::now();
        let mut is_root_page = true;

        while !queue.is_empty() {
            if pages_fetched >= self.limits.page_budget || started.elapsed() >= self.limits.deadline
            {
                truncated = true;
                break;
            }

            // 每轮处理一批页面，批大小受并发度与剩余预算约束
            let batch_size = self
                .limits
                .concurrency
                .min(self.limits.page_budget - pages_fetched)
                .max(1);
            let mut batch: Vec<(Url, u32, Option<String>)> = Vec::new();
            while batch.len() < batch_size {
                match queue.pop_front() {
                    Some(item) => batch.push(item),
                    None => break,
                }
            }

            let fetches = batch
                .iter()
                .map(|(url, _, _)| self.fetcher.fetch(url.as_str()));
            let results = futures::future::join_all(fetches).await;
            pages_fetched += batch.len();

            for ((page_url, depth, parent), result) in batch.into_iter().zip(results) {
                let body = match result {
                    Ok(resp) => resp.body,
                    Err(e) => {
                        if is_root_page {
                            return Err(DiscoveryError::RootUnreachable(format!(
                                "{}: {}",
                                page_url, e
                            )));
                        }
                        match e {
                            FetchError::RobotsDisallowed(_) => {
                                debug!("Skipping {} (robots.txt)", page_url)
                            }
                            other => warn!("Error crawling {}: {}", page_url, other),
                        }
                        continue;
                    }
                };
                is_root_page = false;

                let parsed = self.parse_page(&body, &page_url, &root);
                excluded_links += parsed.excluded;

                // 页面自身的分类：URL形态优先，其次链接密度
                let page_class = match classify_path(page_url.path()) {
                    LinkKind::Article => UrlClass::Content,
                    _ if parsed.link_count >= self.limits.navigation_link_threshold => {
                        UrlClass::Navigation
                    }
                    LinkKind::Index => UrlClass::Navigation,
                    _ => UrlClass::Content,
                };
                entries.push(FrontierEntry::new(
                    url_utils::normalize_url(&page_url),
                    parent,
                    depth,
                    page_class,
                ));

                // 文章与列表页都计入深度：超过上限的不进前沿
                if depth + 1 <= self.limits.depth_limit {
                    for article in parsed.article_links {
                        let normalized = url_utils::normalize_url(&article);
                        if visited.insert(normalized.clone()) {
                            entries.push(FrontierEntry::new(
                                normalized,
                                Some(page_url.to_string()),
                                depth + 1,
                                UrlClass::Content,
                            ));
                        }
                    }
                    for index in parsed.index_links {
                        let normalized = url_utils::normalize_url(&index);
                        if visited.insert(normalized) {
                            queue.push_back((index, depth + 1, Some(page_url.to_string())));
                        }
                    }
                }
            }
        }

        info!(
            "Recursive crawl of {} finished: {} entries, {} pages fetched, truncated={}",
            root_url,
            entries.len(),
            pages_fetched,
            truncated
        );

        Ok(CrawlOutcome {
            entries,
            pages_fetched,
            excluded_links,
            truncated,
        })
    }

    /// 解析页面出链并按形态归类
    fn parse_page(&self, html: &str, page_url: &Url, root: &Url) -> ParsedPage {
        let doc = Html::parse_document(html);
        let selector = Selector::parse("a[href]").expect("Failed to parse anchor selector");

        let mut parsed = ParsedPage {
            link_count: 0,
            article_links: Vec::new(),
            index_links: Vec::new(),
            excluded: 0,
        };

        for anchor in doc.select(&selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            parsed.link_count += 1;

            let Ok(absolute) = url_utils::resolve_url(page_url, href) else {
                continue;
            };
            if !matches!(absolute.scheme(), "http" | "https") {
                continue;
            }

            if !url_utils::same_registrable_domain(&absolute, root) {
                parsed.excluded += 1;
                continue;
            }
            if !is_useful_link(absolute.as_str(), self.exclude_patterns) {
                parsed.excluded += 1;
                continue;
            }

            match classify_path(absolute.path()) {
                LinkKind::Article => parsed.article_links.push(absolute),
                LinkKind::Index => parsed.index_links.push(absolute),
                LinkKind::Unknown => {}
            }
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_date_path_is_article() {
        assert_eq!(classify_path("/2026/01/some-story"), LinkKind::Article);
        assert_eq!(classify_path("/jan/some-story"), LinkKind::Article);
    }

    #[test]
    fn test_classify_id_path_is_article() {
        assert_eq!(classify_path("/story-483920.html"), LinkKind::Article);
        assert_eq!(classify_path("/article/1234567"), LinkKind::Article);
    }

    #[test]
    fn test_classify_index_keywords() {
        assert_eq!(classify_path("/news"), LinkKind::Index);
        assert_eq!(classify_path("/blog/"), LinkKind::Index);
        assert_eq!(classify_path("/category/tech"), LinkKind::Index);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_path("/about"), LinkKind::Unknown);
    }

    #[test]
    fn test_classification_is_deterministic() {
        for _ in 0..10 {
            assert_eq!(classify_path("/news"), LinkKind::Index);
            assert_eq!(classify_path("/2026/01/x"), LinkKind::Article);
        }
    }

    #[test]
    fn test_useful_link_filters() {
        let patterns = vec!["/tag/".to_string(), "/ad/".to_string(), "login".to_string()];
        assert!(is_useful_link("https://example.com/2026/01/story", &patterns));
        assert!(!is_useful_link("https://example.com/tag/rust", &patterns));
        assert!(!is_useful_link("https://example.com/ad/banner", &patterns));
        assert!(!is_useful_link("https://example.com/login", &patterns));
        assert!(!is_useful_link("https://example.com/logo.png", &patterns));
        assert!(!is_useful_link("javascript:void(0)", &patterns));
    }
}
