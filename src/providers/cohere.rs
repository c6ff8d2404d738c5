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

const COHERE_CHAT_URL: &str = "https://api.cohere.com/v1/chat";
const COHERE_EMBED_URL: &str = "https://api.cohere.com/v1/embed";

/// Cohere提供商
///
/// 同时提供推理与向量化两种能力
pub struct CohereProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embedding_model: String,
}

impl CohereProvider {
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
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| "command-r".to_string()),
            embedding_model: settings
                .embedding_model
                .clone()
                .unwrap_or_else(|| "embed-english-v3.0".to_string()),
        })
    }
}

#[async_trait]
impl ReasoningProvider for CohereProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.model,
            "message": request.prompt,
            "temperature": request.temperature,
        });
        if let Some(system) = &request.system {
            body["preamble"] = json!(system);
        }

        let response = self
            .client
            .post(COHERE_CHAT_URL)
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

        payload["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::MalformedOutput("missing text".to_string()))
    }

    fn name(&self) -> &'static str {
        "cohere"
    }
}

#[async_trait]
impl EmbeddingProvider for CohereProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({
            "model": self.embedding_model,
            "texts": [text],
            "input_type": "search_document",
        });

        let response = self
            .client
            .post(COHERE_EMBED_URL)
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

        let vector = payload["embeddings"][0]
            .as_array()
            .ok_or_else(|| ProviderError::MalformedOutput("missing embeddings[0]".to_string()))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Vec<f32>>();

        if vector.is_empty() {
            return Err(ProviderError::MalformedOutput("empty embedding".to_string()));
        }
        Ok(vector)
    }

    fn name(&self) -> &'static str {
        "cohere"
    }
}
