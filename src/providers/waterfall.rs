// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::providers::health::HealthRegistry;
use crate::providers::schema::{parse_annotations, Annotations, CATEGORIES};
use crate::providers::traits::{
    Capability, ChatRequest, EmbeddingProvider, ProviderError, ReasoningProvider, SearchHit,
    SearchProvider,
};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, warn};

/// 瀑布产出的富化结果（含实际产出的提供商名称）
#[derive(Debug, Clone)]
pub struct EnrichmentOutput {
    pub provider: &'static str,
    pub annotations: Annotations,
}

/// 提供商瀑布
///
/// 每种能力维护一条按优先级排序的提供商链。调用严格按配置
/// 顺序进行：冷却中的提供商直接跳过（零网络往返），可恢复
/// 错误降级到下一个提供商，不可恢复错误把提供商置为不可用
/// 但当前调用仍然继续降级。链上全部失败即瀑布耗尽，作为
/// 硬失败上抛，由队列层带退避重新入队。
pub struct ProviderWaterfall {
    reasoning: Vec<Arc<dyn ReasoningProvider>>,
    embedding: Vec<Arc<dyn EmbeddingProvider>>,
    search: Vec<Arc<dyn SearchProvider>>,
    health: Arc<HealthRegistry>,
    summary_limit: usize,
    max_context_chars: usize,
}

impl ProviderWaterfall {
    /// 创建新的提供商瀑布
    ///
    /// # 参数
    ///
    /// * `reasoning` - 推理链（优先级顺序）
    /// * `embedding` - 向量链
    /// * `search` - 搜索链
    /// * `health` - 共享健康登记表
    /// * `summary_limit` - 摘要长度上限
    /// * `max_context_chars` - 送入提供商的正文上限
    pub fn new(
        reasoning: Vec<Arc<dyn ReasoningProvider>>,
        embedding: Vec<Arc<dyn EmbeddingProvider>>,
        search: Vec<Arc<dyn SearchProvider>>,
        health: Arc<HealthRegistry>,
        summary_limit: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            reasoning,
            embedding,
            search,
            health,
            summary_limit,
            max_context_chars,
        }
    }

    /// 校验所需能力都有至少一个已配置的提供商
    ///
    /// 缺失即为致命配置错误，在启动时立刻失败而不是留到运行期
    pub fn verify_capabilities(&self, required: &[Capability]) -> Result<(), ProviderError> {
        for capability in required {
            let configured = match capability {
                Capability::Reasoning => !self.reasoning.is_empty(),
                Capability::Embedding => !self.embedding.is_empty(),
                Capability::Search => !self.search.is_empty(),
            };
            if !configured {
                return Err(ProviderError::MissingCredentials(capability.to_string()));
            }
        }
        Ok(())
    }

    /// 健康登记表句柄（状态视图与操作员重置用）
    pub fn health(&self) -> Arc<HealthRegistry> {
        self.health.clone()
    }

    /// 推理能力：返回首个成功提供商的文本输出
    pub async fn reason(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        for provider in &self.reasoning {
            let name = provider.name();
            if !self.health.is_available(name) {
                continue;
            }
            match provider.complete(request).await {
                Ok(text) => {
                    self.health.record_success(name);
                    return Ok(text);
                }
                Err(e) => {
                    self.handle_failure(name, &e);
                }
            }
        }
        counter!("waterfall_exhausted_total", "capability" => "reasoning").increment(1);
        Err(ProviderError::Exhausted(Capability::Reasoning))
    }

    /// 富化能力：分析文档并产出规范化注解
    ///
    /// 输出校验属于降级循环的一部分：某个提供商返回畸形
    /// 结构时按可恢复失败处理，继续尝试下一个提供商。
    pub async fn enrich(
        &self,
        title: &str,
        text: &str,
    ) -> Result<EnrichmentOutput, ProviderError> {
        let request = self.build_enrichment_request(title, text);

        for provider in &self.reasoning {
            let name = provider.name();
            if !self.health.is_available(name) {
                continue;
            }
            match provider.complete(&request).await {
                Ok(raw) => match parse_annotations(&raw, self.summary_limit) {
                    Ok(annotations) => {
                        self.health.record_success(name);
                        info!("Enrichment produced by provider {}", name);
                        return Ok(EnrichmentOutput {
                            provider: name,
                            annotations,
                        });
                    }
                    Err(e) => {
                        warn!("Provider {} returned malformed annotations: {}", name, e);
                        self.handle_failure(name, &e);
                    }
                },
                Err(e) => {
                    self.handle_failure(name, &e);
                }
            }
        }
        counter!("waterfall_exhausted_total", "capability" => "reasoning").increment(1);
        Err(ProviderError::Exhausted(Capability::Reasoning))
    }

    /// 向量化能力
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        for provider in &self.embedding {
            let name = provider.name();
            if !self.health.is_available(name) {
                continue;
            }
            match provider.embed(text).await {
                Ok(vector) if !vector.is_empty() => {
                    self.health.record_success(name);
                    return Ok(vector);
                }
                Ok(_) => {
                    let e = ProviderError::MalformedOutput("empty embedding".to_string());
                    self.handle_failure(name, &e);
                }
                Err(e) => {
                    self.handle_failure(name, &e);
                }
            }
        }
        counter!("waterfall_exhausted_total", "capability" => "embedding").increment(1);
        Err(ProviderError::Exhausted(Capability::Embedding))
    }

    /// 搜索能力
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, ProviderError> {
        for provider in &self.search {
            let name = provider.name();
            if !self.health.is_available(name) {
                continue;
            }
            match provider.search(query, limit).await {
                Ok(hits) => {
                    self.health.record_success(name);
                    return Ok(hits);
                }
                Err(e) => {
                    self.handle_failure(name, &e);
                }
            }
        }
        counter!("waterfall_exhausted_total", "capability" => "search").increment(1);
        Err(ProviderError::Exhausted(Capability::Search))
    }

    /// 统一的失败处理：按错误分类更新健康表，返回是否可恢复
    fn handle_failure(&self, name: &str, error: &ProviderError) -> bool {
        if error.is_recoverable() {
            warn!(
                "Provider {} failed with recoverable error: {}, trying next provider",
                name, error
            );
            self.health.record_recoverable_failure(name);
            true
        } else {
            warn!(
                "Provider {} failed with non-recoverable error: {}, marking unavailable",
                name, error
            );
            self.health.record_non_recoverable_failure(name);
            false
        }
    }

    fn build_enrichment_request(&self, title: &str, text: &str) -> ChatRequest {
        let snippet = truncate_chars(text, self.max_context_chars);
        let prompt = format!(
            "Analyze this article:\n\nTITLE: {}\n\nTEXT:\n{}\n\n\
             Return JSON with exactly these keys:\n\
             {{\n\
               \"summary\": \"3 concise sentences\",\n\
               \"tags\": [\"tag1\", \"tag2\", \"tag3\"],\n\
               \"category\": one of {:?},\n\
               \"urgency\": <integer 1-10>\n\
             }}",
            title, snippet, CATEGORIES
        );
        ChatRequest::new(prompt)
            .with_system("You are an expert news analyst. Output valid JSON only.")
            .json()
    }
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    s.chars().take(limit).collect()
}
