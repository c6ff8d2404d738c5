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

use crate::config::settings::FetcherSettings;
use crate::utils::robots::{RobotsChecker, RobotsCheckerTrait};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout fetching {0}")]
    Timeout(String),
    /// robots.txt禁止访问，属于策略违规，永不重试
    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),
    /// 响应体超过大小上限
    #[error("Body exceeds size cap of {limit} bytes")]
    BodyTooLarge { limit: usize },
    /// 非成功的HTTP状态码
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// 无效URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// 判断错误是否可重试
    ///
    /// 策略违规（robots禁止）与客户端错误不可重试；
    /// 超时、连接失败与服务端错误可重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            FetchError::Timeout(_) => true,
            FetchError::HttpStatus(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub body: String,
    /// 内容类型
    pub content_type: String,
    /// 响应头
    pub headers: HashMap<String, String>,
    /// 重定向后的最终URL
    pub final_url: String,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 抓取器
///
/// 执行单次HTTP检索：robots合规门禁、独立超时与响应体大小上限。
/// robots.txt按域名在运行周期内解析一次并缓存。
pub struct Fetcher {
    client: reqwest::Client,
    robots: Arc<RobotsChecker>,
    user_agent: String,
    timeout: Duration,
    max_body_bytes: usize,
    default_crawl_delay: Duration,
}

impl Fetcher {
    /// 创建新的抓取器实例
    ///
    /// # 参数
    ///
    /// * `settings` - 抓取器配置
    /// * `robots` - robots.txt检查器
    pub fn new(settings: &FetcherSettings, robots: Arc<RobotsChecker>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            robots,
            user_agent: settings.user_agent.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_body_bytes: settings.max_body_bytes,
            default_crawl_delay: Duration::from_secs(settings.default_crawl_delay_secs),
        }
    }

    /// 执行一次HTTP检索，先通过robots门禁
    ///
    /// # 参数
    ///
    /// * `url` - 目标URL
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 状态码、响应体与响应头
    /// * `Err(FetchError)` - 类型化的抓取错误
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let allowed = self
            .robots
            .is_allowed(url, &self.user_agent)
            .await
            .unwrap_or(true);
        if !allowed {
            return Err(FetchError::RobotsDisallowed(url.to_string()));
        }

        let delay = self
            .robots
            .get_crawl_delay(url, &self.user_agent)
            .await
            .ok()
            .flatten()
            .unwrap_or(self.default_crawl_delay);
        if !delay.is_zero() {
            // 不在此处按域名排队，延迟仅用于单次请求的节流
            tokio::time::sleep(delay.min(Duration::from_secs(10))).await;
        }

        self.fetch_unchecked(url).await
    }

    /// 执行一次HTTP检索，跳过robots门禁
    ///
    /// 用于robots.txt自身与sitemap等元数据文件
    pub async fn fetch_unchecked(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(url.to_string())
                } else {
                    FetchError::RequestFailed(e)
                }
            })?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(status_code));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        // 流式读取并强制大小上限，Content-Length缺失时同样生效
        let mut body_bytes: Vec<u8> = Vec::new();
        let mut response = response;
        while let Some(chunk) = response.chunk().await? {
            if body_bytes.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body_bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&body_bytes).into_owned();
        let response_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Fetched {} ({} bytes, {}ms)",
            final_url,
            body.len(),
            response_time_ms
        );

        Ok(FetchResponse {
            status_code,
            body,
            content_type,
            headers,
            final_url,
            response_time_ms,
        })
    }
}
