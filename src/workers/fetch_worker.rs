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

use crate::domain::models::document::{Document, EnrichmentStatus, ExtractionStatus};
use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::document_repository::DocumentRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::engines::{FetchError, Fetcher};
use crate::extraction::Extractor;
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::worker::{retry_or_park, Worker};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 抓取工作者
///
/// 消费fetch队列：抓取文档URL、提取正文并计算内容哈希。
/// 只有提取成功且哈希与已存值不同的文档才会被链入富化队列，
/// 未变化的页面在这里被拦下（幂等）。
pub struct FetchWorker {
    repository: Arc<dyn TaskRepository>,
    documents: Arc<dyn DocumentRepository>,
    fetcher: Arc<Fetcher>,
    extractor: Arc<dyn Extractor>,
    retry_policy: RetryPolicy,
    worker_id: Uuid,
}

impl FetchWorker {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        documents: Arc<dyn DocumentRepository>,
        fetcher: Arc<Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            repository,
            documents,
            fetcher,
            extractor,
            retry_policy: RetryPolicy::standard(),
            worker_id: Uuid::new_v4(),
        }
    }

    /// 领取并处理一个任务；队列为空时返回false
    pub async fn process_next(&self) -> Result<bool, WorkerError> {
        let task_opt = self
            .repository
            .acquire_next(self.worker_id, TaskType::Fetch)
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
            error!("Fetch task missing document_id");
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };

        let Some(mut document) = self.documents.find_by_id(document_id).await? else {
            error!("Document {} not found", document_id);
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };

        let response = match self.fetcher.fetch(&document.url).await {
            Ok(resp) => resp,
            Err(FetchError::RobotsDisallowed(url)) => {
                // 策略违规：不重试，该URL对这个域名永久排除
                warn!("Blocked by robots.txt: {}", url);
                counter!("fetch_total", "outcome" => "robots_blocked").increment(1);
                document.extraction_status = ExtractionStatus::Failed;
                document.updated_at = Utc::now().into();
                self.documents.update(&document).await?;
                self.repository.mark_completed(task.id).await?;
                return Ok(());
            }
            Err(e) if e.is_retryable() => {
                warn!("Transient fetch error for {}: {}", document.url, e);
                counter!("fetch_total", "outcome" => "transient_error").increment(1);
                retry_or_park(task, &self.repository, &self.retry_policy).await?;
                return Ok(());
            }
            Err(e) => {
                warn!("Permanent fetch error for {}: {}", document.url, e);
                counter!("fetch_total", "outcome" => "permanent_error").increment(1);
                document.extraction_status = ExtractionStatus::Failed;
                document.updated_at = Utc::now().into();
                self.documents.update(&document).await?;
                self.repository.mark_failed(task.id).await?;
                return Ok(());
            }
        };

        let extracted = match self.extractor.extract(&response.body, &document.url) {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!("Extraction failed for {}: {}", document.url, e);
                counter!("fetch_total", "outcome" => "extraction_failed").increment(1);
                document.extraction_status = ExtractionStatus::Failed;
                document.fetched_at = Some(Utc::now().into());
                document.updated_at = Utc::now().into();
                self.documents.update(&document).await?;
                self.repository.mark_failed(task.id).await?;
                return Ok(());
            }
        };

        let content_hash = hex::encode(Sha256::digest(extracted.text.as_bytes()));

        if document.is_unchanged(&content_hash) {
            // 内容未变化：刷新抓取时间即可，不触发富化
            info!("Content unchanged for {}, skipping enrichment", document.url);
            counter!("fetch_total", "outcome" => "unchanged").increment(1);
            document.extraction_status = ExtractionStatus::Extracted;
            document.fetched_at = Some(Utc::now().into());
            document.updated_at = Utc::now().into();
            self.documents.update(&document).await?;
            self.repository.mark_completed(task.id).await?;
            return Ok(());
        }

        document.title = Some(extracted.title);
        document.text = Some(extracted.text);
        document.published_at = extracted.published_at.map(Into::into);
        document.content_hash = Some(content_hash.clone());
        document.extraction_status = ExtractionStatus::Extracted;
        document.enrichment_status = EnrichmentStatus::Pending;
        document.fetched_at = Some(Utc::now().into());
        document.updated_at = Utc::now().into();
        self.documents.update(&document).await?;

        let enrich = Task::enrich(
            document.source_id,
            document.id,
            document.url.clone(),
            &content_hash,
        );
        self.repository.create(&enrich).await?;

        info!("Fetched and extracted {}, enrichment queued", document.url);
        counter!("fetch_total", "outcome" => "success").increment(1);
        self.repository.mark_completed(task.id).await?;
        Ok(())
    }
}

#[async_trait]
impl Worker for FetchWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!("Fetch worker {} started", self.worker_id);
        loop {
            match self.process_next().await {
                Ok(processed) => {
                    if !processed {
                        sleep(Duration::from_secs(1)).await;
                    }
                }
                Err(e) => {
                    error!("Error processing fetch task: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "fetch_worker"
    }
}
