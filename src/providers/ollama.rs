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

/// 本地Ollama提供商
///
/// 链上的最后一级回退：无外部凭据，走本地HTTP服务。
/// 同时提供推理与向量化两种能力。
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    /// 从配置创建提供商实例；显式禁用时返回None
    pub fn from_settings(settings: &ProviderEndpointSettings, timeout: Duration) -> Option<Self> {
        if !settings.enabled.unwrap_or(false) {
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Some(Self {
            client,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| "phi3.5".to_string()),
            embedding_model: settings
                .embedding_model
                .clone()
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
        })
    }
}

#[async_trait]
impl ReasoningProvider for OllamaProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": request.temperature, "num_ctx": 4096 },
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if request.json_mode {
            body["format"] = json!("json");
        }

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
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

        payload["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::MalformedOutput("missing response".to_string()))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({ "model": self.embedding_model, "prompt": text });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
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

        let vector = payload["embedding"]
            .as_array()
            .ok_or_else(|| ProviderError::MalformedOutput("missing embedding".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Vec<f32>>();

        if vector.is_empty() {
            return Err(ProviderError::MalformedOutput("empty embedding".to_string()));
        }
        Ok(vector)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
