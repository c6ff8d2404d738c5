// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 提供商模块
///
/// 提供推理、向量化与搜索三种能力的瀑布式降级链。
/// 提供商按固定优先级排列：AvalAI → Cloudflare → Cohere →
/// OpenRouter → 本地Ollama；搜索为Tavily → DuckDuckGo。
pub mod avalai;
pub mod cloudflare;
pub mod cohere;
pub mod duckduckgo;
pub mod health;
pub mod ollama;
pub mod openrouter;
pub mod schema;
pub mod tavily;
pub mod traits;
pub mod waterfall;

use crate::config::settings::ProviderSettings;
use crate::providers::avalai::AvalAiProvider;
use crate::providers::cloudflare::CloudflareProvider;
use crate::providers::cohere::CohereProvider;
use crate::providers::duckduckgo::DuckDuckGoProvider;
use crate::providers::health::HealthRegistry;
use crate::providers::ollama::OllamaProvider;
use crate::providers::openrouter::OpenRouterProvider;
use crate::providers::tavily::TavilyProvider;
use crate::providers::traits::{
    Capability, EmbeddingProvider, ProviderError, ReasoningProvider, SearchProvider,
};
use crate::providers::waterfall::ProviderWaterfall;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 按配置组装提供商瀑布
///
/// 未配置凭据的提供商被静默跳过；某一必需能力没有任何
/// 提供商时立即返回致命配置错误，而不是等到第一次调用。
pub fn build_waterfall(
    settings: &ProviderSettings,
    required: &[Capability],
) -> Result<Arc<ProviderWaterfall>, ProviderError> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let health = Arc::new(HealthRegistry::new(
        Duration::from_secs(settings.cooldown_base_secs),
        Duration::from_secs(settings.cooldown_max_secs),
    ));

    let mut reasoning: Vec<Arc<dyn ReasoningProvider>> = Vec::new();
    let mut embedding: Vec<Arc<dyn EmbeddingProvider>> = Vec::new();
    let mut search: Vec<Arc<dyn SearchProvider>> = Vec::new();

    if let Some(p) = AvalAiProvider::from_settings(&settings.avalai, timeout) {
        reasoning.push(Arc::new(p));
    }
    if let Some(p) = CloudflareProvider::from_settings(&settings.cloudflare, timeout) {
        let p = Arc::new(p);
        reasoning.push(p.clone());
        embedding.push(p);
    }
    if let Some(p) = CohereProvider::from_settings(&settings.cohere, timeout) {
        let p = Arc::new(p);
        reasoning.push(p.clone());
        embedding.push(p);
    }
    if let Some(p) = OpenRouterProvider::from_settings(&settings.openrouter, timeout) {
        reasoning.push(Arc::new(p));
    }
    if let Some(p) = OllamaProvider::from_settings(&settings.ollama, timeout) {
        let p = Arc::new(p);
        reasoning.push(p.clone());
        embedding.push(p);
    }
    if let Some(p) = TavilyProvider::from_settings(&settings.tavily, timeout) {
        search.push(Arc::new(p));
    }
    if let Some(p) = DuckDuckGoProvider::from_settings(&settings.duckduckgo, timeout) {
        search.push(Arc::new(p));
    }

    info!(
        "Provider waterfall assembled: {} reasoning, {} embedding, {} search",
        reasoning.len(),
        embedding.len(),
        search.len()
    );

    let waterfall = ProviderWaterfall::new(
        reasoning,
        embedding,
        search,
        health,
        settings.summary_max_chars,
        settings.max_context_chars,
    );
    waterfall.verify_capabilities(required)?;

    Ok(Arc::new(waterfall))
}
