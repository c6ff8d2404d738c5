// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ProviderEndpointSettings;
use crate::providers::traits::{ProviderError, SearchHit, SearchProvider};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use url::Url;

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo搜索提供商
///
/// 无需凭据的兜底搜索：抓取HTML端点并用正则解析结果列表。
/// 结果链接是站内跳转地址，真实URL藏在uddg查询参数里。
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
    result_regex: Regex,
    snippet_regex: Regex,
    html_clean_regex: Regex,
}

impl DuckDuckGoProvider {
    /// 从配置创建提供商实例；显式禁用时返回None
    pub fn from_settings(settings: &ProviderEndpointSettings, timeout: Duration) -> Option<Self> {
        if !settings.enabled.unwrap_or(true) {
            return None;
        }
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let result_regex = Regex::new(
            r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#,
        )
        .expect("Failed to compile result regex");
        let snippet_regex =
            Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
                .expect("Failed to compile snippet regex");
        let html_clean_regex =
            Regex::new(r"<[^>]+>").expect("Failed to compile HTML clean regex");

        Some(Self {
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DDG_HTML_URL.to_string()),
            result_regex,
            snippet_regex,
            html_clean_regex,
        })
    }

    /// 还原DuckDuckGo跳转链接中的真实URL
    fn decode_redirect(href: &str) -> Option<String> {
        let absolute = if href.starts_with("//") {
            format!("https:{}", href)
        } else {
            href.to_string()
        };
        let url = Url::parse(&absolute).ok()?;
        if url.path().starts_with("/l/") {
            url.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        } else {
            Some(absolute)
        }
    }

    fn clean_html(&self, fragment: &str) -> String {
        let stripped = self.html_clean_regex.replace_all(fragment, "");
        html_escape::decode_html_entities(stripped.trim()).into_owned()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::MalformedOutput(e.to_string()))?;

        let snippets: Vec<String> = self
            .snippet_regex
            .captures_iter(&body)
            .map(|c| self.clean_html(&c[1]))
            .collect();

        let mut hits = Vec::new();
        for (index, capture) in self.result_regex.captures_iter(&body).enumerate() {
            if hits.len() >= limit as usize {
                break;
            }
            let Some(url) = Self::decode_redirect(&capture[1]) else {
                continue;
            };
            if !url.starts_with("http") {
                continue;
            }
            hits.push(SearchHit {
                title: self.clean_html(&capture[2]),
                url,
                snippet: snippets.get(index).cloned(),
            });
        }

        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}
