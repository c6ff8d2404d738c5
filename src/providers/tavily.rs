// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ProviderEndpointSettings;
use crate::providers::traits::{ProviderError, SearchHit, SearchProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Tavily搜索提供商
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyProvider {
    /// 从配置创建提供商实例；缺少API密钥时返回None
    pub fn from_settings(settings: &ProviderEndpointSettings, timeout: Duration) -> Option<Self> {
        let api_key = settings.api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Some(Self {
            client,
            api_key,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| TAVILY_URL.to_string()),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ProviderError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": limit,
        });

        let response = self.client.post(&self.base_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedOutput(e.to_string()))?;

        let results = payload["results"]
            .as_array()
            .ok_or_else(|| ProviderError::MalformedOutput("missing results".to_string()))?;

        let hits = results
            .iter()
            .filter_map(|r| {
                let url = r["url"].as_str()?.to_string();
                Some(SearchHit {
                    title: r["title"].as_str().unwrap_or_default().to_string(),
                    url,
                    snippet: r["content"].as_str().map(|s| s.to_string()),
                })
            })
            .take(limit as usize)
            .collect();

        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}
