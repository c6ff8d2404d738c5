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

use crate::config::settings::OrchestratorSettings;
use crate::discovery::is_useful_link;
use crate::domain::models::document::{Document, EnrichmentStatus};
use crate::domain::models::source::Source;
use crate::domain::models::task::Task;
use crate::domain::repositories::document_repository::DocumentRepository;
use crate::domain::repositories::enrichment_repository::EnrichmentRepository;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::providers::traits::ChatRequest;
use crate::providers::waterfall::ProviderWaterfall;
use crate::utils::url_utils;
use crate::vector::VectorStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// 编排器产出的回答
#[derive(Debug, Clone, Serialize)]
pub struct AnswerReport {
    /// 回答正文
    pub answer: String,
    /// 引用的文档ID
    pub cited_documents: Vec<Uuid>,
    /// 上下文不足时为true；编排器宁可降低置信度也不编造来源
    pub low_confidence: bool,
    /// 补缺阶段注册的新URL
    pub gap_filled_urls: Vec<String>,
}

/// 审计阶段的结论
struct AuditOutcome {
    /// 覆盖是否充分
    sufficient: bool,
    /// 覆盖不足时的补缺搜索查询
    queries: Vec<String>,
}

/// 代理编排器
///
/// 把Audit → Gap-Fill → Synthesis串成一次完整的答题流程：
/// 先对向量存储做相似度审计，覆盖不足时通过搜索瀑布补缺并
/// 注册候选来源，有界等待新文档富化后综合作答。
pub struct Orchestrator {
    waterfall: Arc<ProviderWaterfall>,
    vector_store: Arc<dyn VectorStore>,
    documents: Arc<dyn DocumentRepository>,
    enrichments: Arc<dyn EnrichmentRepository>,
    sources: Arc<dyn SourceRepository>,
    tasks: Arc<dyn TaskRepository>,
    settings: OrchestratorSettings,
    exclude_patterns: Vec<String>,
    candidate_depth_limit: i32,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        waterfall: Arc<ProviderWaterfall>,
        vector_store: Arc<dyn VectorStore>,
        documents: Arc<dyn DocumentRepository>,
        enrichments: Arc<dyn EnrichmentRepository>,
        sources: Arc<dyn SourceRepository>,
        tasks: Arc<dyn TaskRepository>,
        settings: OrchestratorSettings,
        exclude_patterns: Vec<String>,
        candidate_depth_limit: i32,
    ) -> Self {
        Self {
            waterfall,
            vector_store,
            documents,
            enrichments,
            sources,
            tasks,
            settings,
            exclude_patterns,
            candidate_depth_limit,
        }
    }

    /// 回答一个问题
    ///
    /// 无论中间发生什么，总是返回一个回答；上下文不足时
    /// 以low_confidence标注而不是抛给调用方一个错误。
    pub async fn answer(&self, question: &str) -> AnswerReport {
        let audit = self.audit(question).await;

        let mut gap_filled_urls = Vec::new();
        let mut gap_fill_delivered = true;
        if !audit.sufficient {
            let (urls, delivered) = self.gap_fill(&audit.queries, question).await;
            gap_filled_urls = urls;
            gap_fill_delivered = delivered;
        }

        self.synthesize(question, audit.sufficient, gap_fill_delivered, gap_filled_urls)
            .await
    }

    /// Audit：相似度检索加覆盖判定
    async fn audit(&self, question: &str) -> AuditOutcome {
        let insufficient = |queries: Vec<String>| AuditOutcome {
            sufficient: false,
            queries,
        };

        let embedding = match self.waterfall.embed(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Audit embedding failed: {}", e);
                return insufficient(vec![question.to_string()]);
            }
        };

        let hits = match self
            .vector_store
            .search(&embedding, self.settings.audit_limit)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Audit vector search failed: {}", e);
                return insufficient(vec![question.to_string()]);
            }
        };

        // 覆盖判定：命中数与最高相似度双重门槛
        let coverage = hits.len() >= self.settings.min_coverage_hits
            && hits
                .first()
                .is_some_and(|top| top.score >= self.settings.similarity_threshold);

        let hit_ids: Vec<Uuid> = hits.iter().map(|h| h.id).collect();
        if coverage {
            info!(
                "Audit: coverage sufficient ({} hits, top score {:.2})",
                hits.len(),
                hits[0].score
            );
            return AuditOutcome {
                sufficient: true,
                queries: Vec::new(),
            };
        }

        // 覆盖不足：请推理瀑布提出针对性的补缺查询
        let queries = self.propose_queries(question, &hit_ids).await;
        AuditOutcome {
            sufficient: false,
            queries,
        }
    }

    async fn propose_queries(&self, question: &str, hit_ids: &[Uuid]) -> Vec<String> {
        let context = match self.enrichments.find_by_documents(hit_ids).await {
            Ok(results) if !results.is_empty() => results
                .iter()
                .map(|r| format!("- [{}] {}", r.category, r.summary))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "No info.".to_string(),
        };

        let prompt = format!(
            "QUERY: {}\n\nCURRENT KNOWLEDGE BASE (top matches):\n{}\n\n\
             The knowledge base does not sufficiently cover the query.\n\
             Propose 3 specific web search queries to find the missing information.\n\
             Output one query per line, nothing else.",
            question, context
        );
        let request = ChatRequest::new(prompt)
            .with_system("You are an intelligent research auditor. Output strictly text.");

        match self.waterfall.reason(&request).await {
            Ok(response) => {
                let queries: Vec<String> = response
                    .lines()
                    .map(|l| l.trim().trim_start_matches(['-', '*', ' ']).to_string())
                    .filter(|l| l.len() > 3)
                    .take(3)
                    .collect();
                if queries.is_empty() {
                    vec![question.to_string()]
                } else {
                    queries
                }
            }
            Err(e) => {
                warn!("Audit reasoning failed: {}", e);
                vec![question.to_string()]
            }
        }
    }

    /// Gap-Fill：搜索瀑布找候选URL，注册候选来源并入队抓取，
    /// 有界等待富化完成。返回注册的URL与等待是否有产出。
    async fn gap_fill(&self, queries: &[String], question: &str) -> (Vec<String>, bool) {
        let mut candidates: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for query in queries {
            match self
                .waterfall
                .search(query, self.settings.search_results_per_query)
                .await
            {
                Ok(hits) => {
                    for hit in hits {
                        if seen.insert(hit.url.clone()) {
                            candidates.push(hit.url);
                        }
                    }
                }
                Err(e) => warn!("Gap-fill search failed for '{}': {}", query, e),
            }
        }

        let mut enqueued_docs: Vec<Uuid> = Vec::new();
        let mut enqueued_urls: Vec<String> = Vec::new();

        for raw_url in candidates {
            if enqueued_docs.len() >= self.settings.gap_fill_limit {
                break;
            }
            if !is_useful_link(&raw_url, &self.exclude_patterns) {
                continue;
            }
            let Ok(url) = Url::parse(&raw_url) else {
                continue;
            };
            let Some(host) = url_utils::registrable_host(&url) else {
                continue;
            };
            if self
                .settings
                .low_signal_domains
                .iter()
                .any(|d| host.contains(d.as_str()))
            {
                continue;
            }

            let normalized = url_utils::normalize_url(&url);
            match self.documents.url_exists(&normalized).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!("Gap-fill dedup check failed: {}", e);
                    continue;
                }
            }

            match self.register_candidate(&url, &normalized, question).await {
                Ok(document_id) => {
                    enqueued_docs.push(document_id);
                    enqueued_urls.push(normalized);
                }
                Err(e) => warn!("Gap-fill registration failed for {}: {}", normalized, e),
            }
        }

        if enqueued_docs.is_empty() {
            info!("Gap-fill produced no new URLs");
            return (enqueued_urls, false);
        }

        info!(
            "Gap-fill enqueued {} URLs, waiting for enrichment",
            enqueued_docs.len()
        );
        let delivered = self.wait_for_enrichment(&enqueued_docs).await;
        (enqueued_urls, delivered)
    }

    /// 把URL注册为候选来源下的文档并派发抓取任务
    async fn register_candidate(
        &self,
        url: &Url,
        normalized: &str,
        question: &str,
    ) -> anyhow::Result<Uuid> {
        let root_url = url_utils::site_root(url)
            .ok_or_else(|| anyhow::anyhow!("URL without host: {}", url))?;

        let source = match self.sources.find_by_root_url(&root_url).await? {
            Some(existing) => existing,
            None => {
                let candidate = Source::new_candidate(
                    root_url,
                    self.candidate_depth_limit,
                    Some(question.to_string()),
                );
                self.sources.create(&candidate).await?
            }
        };

        let stub = Document::stub(source.id, normalized.to_string());
        let document = self.documents.upsert_stub(&stub).await?;
        let task = Task::fetch(source.id, document.id, document.url.clone());
        self.tasks.create(&task).await?;
        Ok(document.id)
    }

    /// 有界轮询等待：全部完成立即返回；超过宽限期且已有部分
    /// 产出时提前结束；超时返回当前进度
    async fn wait_for_enrichment(&self, document_ids: &[Uuid]) -> bool {
        let timeout = Duration::from_secs(self.settings.wait_timeout_secs);
        let poll = Duration::from_secs(self.settings.poll_interval_secs.max(1));
        let early_exit = Duration::from_secs(self.settings.early_exit_after_secs);
        let started = Instant::now();

        loop {
            let mut done = 0usize;
            for id in document_ids {
                match self.documents.find_by_id(*id).await {
                    Ok(Some(doc)) if doc.enrichment_status == EnrichmentStatus::Enriched => {
                        done += 1
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Gap-fill poll failed: {}", e),
                }
            }

            if done >= document_ids.len() {
                info!("Gap-fill: all {} sources ready", document_ids.len());
                return true;
            }
            if done > 0 && started.elapsed() >= early_exit {
                info!(
                    "Gap-fill: proceeding with {}/{} sources after grace period",
                    done,
                    document_ids.len()
                );
                return true;
            }
            if started.elapsed() >= timeout {
                warn!(
                    "Gap-fill: timeout reached with {}/{} sources ready",
                    done,
                    document_ids.len()
                );
                return done > 0;
            }

            tokio::time::sleep(poll).await;
        }
    }

    /// Synthesis：重新审计后基于引用上下文作答
    async fn synthesize(
        &self,
        question: &str,
        audit_was_sufficient: bool,
        gap_fill_delivered: bool,
        gap_filled_urls: Vec<String>,
    ) -> AnswerReport {
        let context_ids = match self.waterfall.embed(question).await {
            Ok(embedding) => match self
                .vector_store
                .search(&embedding, self.settings.synthesis_limit)
                .await
            {
                Ok(hits) => hits.into_iter().map(|h| h.id).collect::<Vec<_>>(),
                Err(e) => {
                    warn!("Synthesis vector search failed: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Synthesis embedding failed: {}", e);
                Vec::new()
            }
        };

        let enrichment_context = self
            .enrichments
            .find_by_documents(&context_ids)
            .await
            .unwrap_or_default();

        if enrichment_context.is_empty() {
            return AnswerReport {
                answer: format!(
                    "I could not find enough reliable information to answer \"{}\". \
                     New sources have been queued for monitoring; please retry later.",
                    question
                ),
                cited_documents: Vec::new(),
                low_confidence: true,
                gap_filled_urls,
            };
        }

        let mut context_blocks = Vec::new();
        let mut cited = Vec::new();
        for result in &enrichment_context {
            let title = match self.documents.find_by_id(result.document_id).await {
                Ok(Some(doc)) => doc.title.unwrap_or_else(|| doc.url.clone()),
                _ => "Untitled".to_string(),
            };
            context_blocks.push(format!(
                "Document {}\nTitle: {}\nCategory: {}\nSummary: {}",
                result.document_id, title, result.category, result.summary
            ));
            cited.push(result.document_id);
        }

        // 覆盖原本充分，或补缺等待期内有新文档富化完成，则按
        // 正常置信度作答；否则答案必须显式声明上下文不足
        let low_confidence = !audit_was_sufficient && !gap_fill_delivered;

        let mut prompt = format!(
            "Write a high-quality, well-structured answer to: \"{}\"\n\n\
             Instructions:\n\
             - Use ONLY the provided context below.\n\
             - Cite supporting documents inline by id, e.g. [doc:<id>].\n\
             - Finish with a 'References' section listing the cited document ids.\n",
            question
        );
        if low_confidence {
            prompt.push_str(
                "- The available context is known to be incomplete. State that \
                 limitation clearly in the conclusion; do not fabricate sources.\n",
            );
        }
        prompt.push_str(&format!("\nContext:\n{}", context_blocks.join("\n\n")));

        let request = ChatRequest::new(prompt)
            .with_system("You are an expert analyst and writer.")
            .with_temperature(0.7);

        match self.waterfall.reason(&request).await {
            Ok(answer) => AnswerReport {
                answer,
                cited_documents: cited,
                low_confidence,
                gap_filled_urls,
            },
            Err(e) => {
                warn!("Synthesis reasoning failed: {}", e);
                AnswerReport {
                    answer: format!(
                        "The reasoning providers are currently unavailable, so a full \
                         answer to \"{}\" could not be produced. {} relevant documents \
                         are on file; please retry later.",
                        question,
                        cited.len()
                    ),
                    cited_documents: cited,
                    low_confidence: true,
                    gap_filled_urls,
                }
            }
        }
    }
}
