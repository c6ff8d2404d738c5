// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::discovery::DiscoveryError;
use crate::engines::Fetcher;
use crate::utils::robots::RobotsChecker;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, warn};

/// Sitemap条目
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    /// 页面URL
    pub url: String,
    /// 最后修改时间
    pub lastmod: Option<DateTime<Utc>>,
}

/// 解析后的sitemap文件
#[derive(Debug)]
enum SitemapDoc {
    /// sitemapindex：指向子sitemap的列表
    Index(Vec<String>),
    /// urlset：页面条目列表
    UrlSet(Vec<SitemapEntry>),
}

/// Sitemap探测器
///
/// 被动发现路径：robots.txt声明优先，其次猜测常见路径。
/// 探测成功的条件是至少返回一条新鲜度窗口内的条目，
/// 否则整体视为探测失败（不存在部分成功）。
pub struct SitemapProbe<'a> {
    fetcher: &'a Fetcher,
    robots: &'a RobotsChecker,
    /// 新鲜度窗口（秒）
    recency_secs: i64,
    /// 单次探测最多抓取的sitemap文件数
    fetch_budget: usize,
    priority_terms: &'a [String],
    skip_terms: &'a [String],
}

impl<'a> SitemapProbe<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        robots: &'a RobotsChecker,
        recency_secs: i64,
        fetch_budget: usize,
        priority_terms: &'a [String],
        skip_terms: &'a [String],
    ) -> Self {
        Self {
            fetcher,
            robots,
            recency_secs,
            fetch_budget,
            priority_terms,
            skip_terms,
        }
    }

    /// 执行sitemap探测
    ///
    /// # 参数
    ///
    /// * `root_url` - 站点根URL
    ///
    /// # 返回值
    ///
    /// * `Ok(entries)` - 新鲜度窗口内的条目（至少一条）
    /// * `Err(DiscoveryError::SitemapProbeFailed)` - 无sitemap或全部过期
    pub async fn probe(&self, root_url: &str) -> Result<Vec<SitemapEntry>, DiscoveryError> {
        let mut candidates = self
            .robots
            .sitemap_urls(root_url)
            .await
            .unwrap_or_default();

        if candidates.is_empty() {
            // 常规约定路径兜底
            let root = root_url.trim_end_matches('/');
            for path in ["/sitemap.xml", "/sitemap_index.xml", "/sitemap-news.xml"] {
                candidates.push(format!("{}{}", root, path));
            }
        }

        // 按关键词打分排序，跳过被否决的地址
        candidates.sort_by_key(|url| std::cmp::Reverse(self.score(url)));
        candidates.retain(|url| self.score(url) > -500);

        let cutoff = Utc::now() - chrono::Duration::seconds(self.recency_secs);
        let mut fresh: Vec<SitemapEntry> = Vec::new();
        let mut fetched = 0usize;
        let mut queue: std::collections::VecDeque<String> = candidates.into();

        while let Some(sitemap_url) = queue.pop_front() {
            if fetched >= self.fetch_budget {
                break;
            }
            fetched += 1;

            let body = match self.fetcher.fetch_unchecked(&sitemap_url).await {
                Ok(resp) => resp.body,
                Err(e) => {
                    debug!("Sitemap fetch failed for {}: {}", sitemap_url, e);
                    continue;
                }
            };

            match parse_sitemap(&body) {
                Ok(SitemapDoc::Index(children)) => {
                    let mut children: Vec<String> = children
                        .into_iter()
                        .filter(|c| self.score(c) > -500)
                        .collect();
                    children.sort_by_key(|url| std::cmp::Reverse(self.score(url)));
                    for child in children {
                        queue.push_back(child);
                    }
                }
                Ok(SitemapDoc::UrlSet(entries)) => {
                    for entry in entries {
                        match entry.lastmod {
                            Some(lastmod) if lastmod >= cutoff => fresh.push(entry),
                            _ => {}
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to parse sitemap {}: {}", sitemap_url, e);
                }
            }
        }

        if fresh.is_empty() {
            return Err(DiscoveryError::SitemapProbeFailed);
        }

        info!(
            "Sitemap probe for {} found {} fresh entries",
            root_url,
            fresh.len()
        );
        Ok(fresh)
    }

    /// 给sitemap地址打分决定抓取优先级
    fn score(&self, url: &str) -> i32 {
        let url_lower = url.to_lowercase();
        let mut score = 0;
        if url_lower.contains("sitemap-news") || url_lower.contains("news-sitemap") {
            score += 100;
        }
        for term in self.priority_terms {
            if url_lower.contains(term.as_str()) {
                score += 10;
            }
        }
        for term in self.skip_terms {
            if url_lower.contains(term.as_str()) {
                score -= 1000;
            }
        }
        score
    }
}

/// 解析sitemap XML，区分索引文件与条目文件
fn parse_sitemap(xml: &str) -> Result<SitemapDoc, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index = false;
    let mut in_loc = false;
    let mut in_lastmod = false;
    let mut current_loc: Option<String> = None;
    let mut current_lastmod: Option<DateTime<Utc>> = None;
    let mut index_urls: Vec<String> = Vec::new();
    let mut entries: Vec<SitemapEntry> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"loc" => in_loc = true,
                b"lastmod" => in_lastmod = true,
                _ => {}
            },
            Event::Text(t) => {
                let text = t.unescape()?.trim().to_string();
                if in_loc {
                    current_loc = Some(text);
                } else if in_lastmod {
                    current_lastmod = parse_lastmod(&text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"loc" => in_loc = false,
                b"lastmod" => in_lastmod = false,
                b"url" => {
                    if let Some(loc) = current_loc.take() {
                        entries.push(SitemapEntry {
                            url: loc,
                            lastmod: current_lastmod.take(),
                        });
                    }
                    current_lastmod = None;
                }
                b"sitemap" => {
                    if let Some(loc) = current_loc.take() {
                        index_urls.push(loc);
                    }
                    current_lastmod = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(SitemapDoc::Index(index_urls))
    } else {
        Ok(SitemapDoc::UrlSet(entries))
    }
}

/// 解析lastmod（W3C datetime：完整时间戳或纯日期）
fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}
