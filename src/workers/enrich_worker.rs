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

use crate::config::settings::SchedulerSettings;
use crate::domain::models::document::EnrichmentStatus;
use crate::domain::models::enrichment::EnrichmentResult;
use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::document_repository::DocumentRepository;
use crate::domain::repositories::enrichment_repository::EnrichmentRepository;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::providers::traits::ProviderError;
use crate::providers::waterfall::ProviderWaterfall;
use crate::queue::scheduler::apply_adapted_interval;
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::vector::VectorStore;
use crate::workers::worker::{retry_or_park, Worker};
use async_trait::async_trait;
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 富化工作者
///
/// 消费enrich队列：内容哈希的CAS检查在调用瀑布之前完成，
/// 未变化的文档不会再次触发任何提供商调用。结果覆盖写入，
/// 向量写入向量存储，瀑布耗尽的任务带退避重新入队。
pub struct EnrichWorker {
    repository: Arc<dyn TaskRepository>,
    documents: Arc<dyn DocumentRepository>,
    enrichments: Arc<dyn EnrichmentRepository>,
    sources: Arc<dyn SourceRepository>,
    waterfall: Arc<ProviderWaterfall>,
    vector_store: Arc<dyn VectorStore>,
    scheduler_settings: SchedulerSettings,
    retry_policy: RetryPolicy,
    worker_id: Uuid,
}

impl EnrichWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        documents: Arc<dyn DocumentRepository>,
        enrichments: Arc<dyn EnrichmentRepository>,
        sources: Arc<dyn SourceRepository>,
        waterfall: Arc<ProviderWaterfall>,
        vector_store: Arc<dyn VectorStore>,
        scheduler_settings: SchedulerSettings,
    ) -> Self {
        Self {
            repository,
            documents,
            enrichments,
            sources,
            waterfall,
            vector_store,
            scheduler_settings,
            retry_policy: RetryPolicy::standard(),
            worker_id: Uuid::new_v4(),
        }
    }

    /// 领取并处理一个任务；队列为空时返回false
    pub async fn process_next(&self) -> Result<bool, WorkerError> {
        let task_opt = self
            .repository
            .acquire_next(self.worker_id, TaskType::Enrich)
            .await?;

        if let Some(task) = task_opt {
            self.process_task(task).await?;
            return Ok(true);
        }
        Ok(false)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, url = %task.url))]
    async fn process_task(&self, task: Task) -> Result<(), WorkerError> {
        let Some(document_id) = task.document_id else {
            error!("Enrich task missing document_id");
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };
        let Some(expected_hash) = task
            .payload
            .get("content_hash")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
        else {
            error!("Enrich task missing content_hash payload");
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };

        let Some(document) = self.documents.find_by_id(document_id).await? else {
            error!("Document {} not found", document_id);
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };

        // 哈希比对是幂等的第一道闸：入队后内容又变了说明有更新
        // 的富化任务在路上，本任务作废
        if !document.is_unchanged(&expected_hash) {
            info!("Document {} superseded, dropping stale enrich task", document.id);
            counter!("enrich_total", "outcome" => "superseded").increment(1);
            self.repository.mark_completed(task.id).await?;
            return Ok(());
        }

        // 已富化且哈希一致：缓存命中，不再调用瀑布
        if document.enrichment_status == EnrichmentStatus::Enriched {
            info!("Document {} already enriched for this hash", document.id);
            counter!("enrich_total", "outcome" => "cached").increment(1);
            self.repository.mark_completed(task.id).await?;
            return Ok(());
        }

        let Some(text) = document.text.clone() else {
            error!("Document {} has no extracted text", document.id);
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };
        let title = document.title.clone().unwrap_or_default();

        let output = match self.waterfall.enrich(&title, &text).await {
            Ok(output) => output,
            Err(e @ ProviderError::Exhausted(_)) => {
                // 瀑布耗尽是硬失败：带退避重新入队，重试用尽后停放
                warn!("Waterfall exhausted for {}: {}", document.url, e);
                counter!("enrich_total", "outcome" => "exhausted").increment(1);
                if !task.can_retry() {
                    let _ = self
                        .documents
                        .set_enrichment_status_cas(
                            document.id,
                            &expected_hash,
                            EnrichmentStatus::Failed,
                        )
                        .await?;
                }
                retry_or_park(task, &self.repository, &self.retry_policy).await?;
                return Ok(());
            }
            Err(e) => {
                error!("Unexpected enrichment error for {}: {}", document.url, e);
                retry_or_park(task, &self.repository, &self.retry_policy).await?;
                return Ok(());
            }
        };

        let mut result = EnrichmentResult::new(
            document.id,
            output.provider.to_string(),
            output.annotations.urgency,
            output.annotations.category.clone(),
            output.annotations.summary.clone(),
            output.annotations.tags.clone(),
        );

        // 向量化失败不阻塞富化结果入库，文档只是暂时搜不到
        match self.waterfall.embed(&output.annotations.summary).await {
            Ok(embedding) => {
                let metadata = json!({
                    "url": document.url,
                    "title": title,
                    "source_id": document.source_id,
                });
                if let Err(e) = self
                    .vector_store
                    .upsert(document.id, embedding, metadata)
                    .await
                {
                    warn!("Vector upsert failed for {}: {}", document.id, e);
                } else {
                    result.embedding_ref = Some(document.id);
                }
            }
            Err(e) => {
                warn!("Embedding unavailable for {}: {}", document.id, e);
            }
        }

        self.enrichments.upsert(&result).await?;

        // 富化状态的落库是内容哈希上的比较交换；0行说明并发工作器
        // 抢先处理了新内容，保留其结果并丢弃本次状态写入
        let rows = self
            .documents
            .set_enrichment_status_cas(document.id, &expected_hash, EnrichmentStatus::Enriched)
            .await?;
        if rows == 0 {
            warn!(
                "Enrichment CAS rejected for document {} (hash changed mid-flight)",
                document.id
            );
            counter!("enrich_total", "outcome" => "cas_rejected").increment(1);
            self.repository.mark_completed(task.id).await?;
            return Ok(());
        }

        info!(
            "Document {} enriched by {} (urgency {})",
            document.url, output.provider, output.annotations.urgency
        );
        counter!("enrich_total", "outcome" => "success").increment(1);

        // 紧急度反馈到来源的自适应调度间隔
        if let Some(source) = self.sources.find_by_id(document.source_id).await? {
            if let Err(e) = apply_adapted_interval(
                &self.sources,
                &self.scheduler_settings,
                source,
                Some(output.annotations.urgency),
                true,
            )
            .await
            {
                warn!("Adaptive interval update failed: {}", e);
            }
        }

        self.repository.mark_completed(task.id).await?;
        Ok(())
    }
}

#[async_trait]
impl Worker for EnrichWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!("Enrich worker {} started", self.worker_id);
        loop {
            match self.process_next().await {
                Ok(processed) => {
                    if !processed {
                        sleep(Duration::from_secs(1)).await;
                    }
                }
                Err(e) => {
                    error!("Error processing enrich task: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "enrich_worker"
    }
}
