// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use regex::Regex;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

use async_trait::async_trait;

/// Robots.txt检查器接口
#[async_trait]
pub trait RobotsCheckerTrait: Send + Sync {
    /// 检查URL是否被允许访问
    async fn is_allowed(&self, url_str: &str, user_agent: &str) -> Result<bool>;
    /// 获取爬取延迟
    async fn get_crawl_delay(&self, url_str: &str, user_agent: &str) -> Result<Option<Duration>>;
}

/// 缓存的Robots.txt内容
#[derive(Clone)]
struct CachedRobots {
    content: String,
    expires_at: Instant,
}

/// Robots.txt检查器
///
/// 每个域名的robots.txt在一次运行周期内只解析一次，结果缓存在内存中。
#[derive(Clone)]
pub struct RobotsChecker {
    /// HTTP客户端
    client: Client,
    /// 内存缓存，键为robots.txt的完整URL
    memory_cache: Arc<Mutex<HashMap<String, CachedRobots>>>,
    /// 缓存有效期
    cache_ttl: Duration,
    /// 请求使用的User-Agent
    user_agent: String,
}

#[async_trait]
impl RobotsCheckerTrait for RobotsChecker {
    async fn is_allowed(&self, url_str: &str, user_agent: &str) -> Result<bool> {
        let content = self.robots_content(url_str).await?;
        let url = Url::parse(url_str)?;
        let path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(user_agent, &path, &content))
    }

    async fn get_crawl_delay(&self, url_str: &str, user_agent: &str) -> Result<Option<Duration>> {
        let content = self.robots_content(url_str).await?;
        Ok(parse_crawl_delay(&content, user_agent))
    }
}

impl RobotsChecker {
    /// 创建新的Robots检查器实例
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            memory_cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl: Duration::from_secs(3600),
            user_agent: user_agent.into(),
        }
    }

    /// 获取指定URL所在域名的robots.txt内容（带缓存）
    ///
    /// 404或持续性网络错误被视为没有robots.txt，返回空内容（即允许所有路径）。
    pub async fn robots_content(&self, url_str: &str) -> Result<String> {
        let url = Url::parse(url_str)?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid URL: {}", url_str))?;
        let scheme = url.scheme();
        let port = url.port_or_known_default().unwrap_or(80);

        let robots_url = format!("{}://{}:{}/robots.txt", scheme, host, port);

        {
            let mut cache = self.memory_cache.lock().unwrap();
            if let Some(cached) = cache.get(&robots_url) {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.content.clone());
                } else {
                    cache.remove(&robots_url);
                }
            }
        }

        let response = self
            .client
            .get(&robots_url)
            .header("User-Agent", self.user_agent.as_str())
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        let content = match response {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            Ok(resp) if resp.status() == reqwest::StatusCode::NOT_FOUND => String::new(),
            Ok(resp) => {
                tracing::warn!(
                    "Unexpected status {} fetching robots.txt from {}",
                    resp.status(),
                    robots_url
                );
                String::new()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch robots.txt from {}: {}", robots_url, e);
                String::new()
            }
        };

        {
            let mut cache = self.memory_cache.lock().unwrap();
            cache.insert(
                robots_url,
                CachedRobots {
                    content: content.clone(),
                    expires_at: Instant::now() + self.cache_ttl,
                },
            );
        }

        Ok(content)
    }

    /// 提取robots.txt中声明的Sitemap地址
    pub async fn sitemap_urls(&self, url_str: &str) -> Result<Vec<String>> {
        let content = self.robots_content(url_str).await?;
        Ok(extract_sitemap_urls(&content))
    }
}

/// 从robots.txt内容中提取Sitemap声明
pub fn extract_sitemap_urls(content: &str) -> Vec<String> {
    // Sitemap指令不属于任何User-agent块，直接按行匹配
    let re = Regex::new(r"(?im)^\s*sitemap:\s*(\S+)").expect("Failed to compile sitemap regex");
    re.captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// 解析Crawl-delay指令
///
/// 简化实现：先匹配具体User-agent块，其次通配块
fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<Duration> {
    let mut current_agent_matched = false;
    let mut delay: Option<f64> = None;
    let mut specific_agent_found = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let lower_line = line.to_lowercase();
        if lower_line.starts_with("user-agent:") {
            let agent = line[11..].trim();
            if agent == "*" {
                current_agent_matched = !specific_agent_found;
            } else if user_agent.to_lowercase().contains(&agent.to_lowercase()) {
                current_agent_matched = true;
                specific_agent_found = true;
                delay = None;
            } else {
                current_agent_matched = false;
            }
        } else if lower_line.starts_with("crawl-delay:") && current_agent_matched {
            if let Ok(d) = line[12..].trim().parse::<f64>() {
                delay = Some(d);
            }
        }
    }

    delay.map(Duration::from_secs_f64)
}
