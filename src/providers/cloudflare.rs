// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ProviderEndpointSettings;
use crate::providers::traits::{
    ChatRequest, EmbeddingProvider, ProviderError, ReasoningProvider,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Cloudflare Workers AI提供商
///
/// 同时提供推理与向量化两种能力
pub struct CloudflareProvider {
    client: reqwest::Client,
    account_id: String,
    api_token: String,
    model: String,
    embedding_model: String,
}

impl CloudflareProvider {
    /// 从配置创建提供商实例；缺少账户或令牌时返回None
    pub fn from_settings(settings: &ProviderEndpointSettings, timeout: Duration) -> Option<Self> {
        let account_id = settings.account_id.clone()?;
        let api_token = settings.api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Some(Self {
            client,
            account_id,
            api_token,
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| "@cf/meta/llama-3-8b-instruct".to_string()),
            embedding_model: settings
                .embedding_model
                .clone()
                .unwrap_or_else(|| "@cf/baai/bge-base-en-v1.5".to_string()),
        })
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id, model
        )
    }

    async fn run(&self, model: &str, body: Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(self.run_url(model))
            .bearer_auth(&self.api_token)
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

        if payload["success"] == json!(false) {
            return Err(ProviderError::MalformedOutput(
                "workers-ai reported success=false".to_string(),
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl ReasoningProvider for CloudflareProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let payload = self
            .run(
                &self.model,
                json!({ "messages": messages, "temperature": request.temperature }),
            )
            .await?;

        payload["result"]["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::MalformedOutput("missing result.response".to_string()))
    }

    fn name(&self) -> &'static str {
        "cloudflare"
    }
}

#[async_trait]
impl EmbeddingProvider for CloudflareProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let payload = self
            .run(&self.embedding_model, json!({ "text": [text] }))
            .await?;

        let vector = payload["result"]["data"][0]
            .as_array()
            .ok_or_else(|| ProviderError::MalformedOutput("missing result.data[0]".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Vec<f32>>();

        if vector.is_empty() {
            return Err(ProviderError::MalformedOutput("empty embedding".to_string()));
        }
        Ok(vector)
    }

    fn name(&self) -> &'static str {
        "cloudflare"
    }
}
