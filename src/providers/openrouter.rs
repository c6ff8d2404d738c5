// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ProviderEndpointSettings;
use crate::providers::traits::{ChatRequest, ProviderError, ReasoningProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter推理提供商
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenRouterProvider {
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
                .unwrap_or_else(|| OPENROUTER_URL.to_string()),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| "mistralai/mistral-small-3.1-24b-instruct:free".to_string()),
        })
    }
}

#[async_trait]
impl ReasoningProvider for OpenRouterProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedOutput(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::MalformedOutput("missing choices[0].message.content".to_string()))
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}
