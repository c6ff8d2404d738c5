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

use crate::discovery::DiscoveryEngine;
use crate::domain::models::document::Document;
use crate::domain::models::source::DiscoveryMode;
use crate::domain::models::task::{Task, TaskType};
use crate::domain::repositories::document_repository::DocumentRepository;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::worker::{retry_or_park, Worker};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 发现工作者
///
/// 消费discovery队列：运行策略选择器解析URL前沿，把被接受
/// 的内容URL物化为文档桩并逐一派发抓取任务。运行级错误只
/// 影响本次前沿，来源的后续调度不受影响。
pub struct DiscoveryWorker {
    repository: Arc<dyn TaskRepository>,
    sources: Arc<dyn SourceRepository>,
    documents: Arc<dyn DocumentRepository>,
    engine: Arc<DiscoveryEngine>,
    retry_policy: RetryPolicy,
    max_documents_per_run: usize,
    worker_id: Uuid,
}

impl DiscoveryWorker {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        sources: Arc<dyn SourceRepository>,
        documents: Arc<dyn DocumentRepository>,
        engine: Arc<DiscoveryEngine>,
        max_documents_per_run: usize,
    ) -> Self {
        Self {
            repository,
            sources,
            documents,
            engine,
            retry_policy: RetryPolicy::standard(),
            max_documents_per_run,
            worker_id: Uuid::new_v4(),
        }
    }

    /// 领取并处理一个任务；队列为空时返回false
    pub async fn process_next(&self) -> Result<bool, WorkerError> {
        let task_opt = self
            .repository
            .acquire_next(self.worker_id, TaskType::Discovery)
            .await?;

        if let Some(task) = task_opt {
            self.process_task(task).await?;
            return Ok(true);
        }
        Ok(false)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, url = %task.url))]
    async fn process_task(&self, task: Task) -> Result<(), WorkerError> {
        let Some(source_id) = task.source_id else {
            error!("Discovery task missing source_id");
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };

        let Some(mut source) = self.sources.find_by_id(source_id).await? else {
            error!("Source {} not found", source_id);
            self.repository.mark_failed(task.id).await?;
            return Ok(());
        };

        // 操作员可以通过任务负载为单次运行强制指定模式
        let force_mode = task
            .payload
            .get("force_mode")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<DiscoveryMode>().ok());

        match self.engine.run(&source, force_mode).await {
            Ok(report) => {
                let accepted = report.content_urls();
                let mut materialized = 0usize;
                for entry in accepted.iter().take(self.max_documents_per_run) {
                    let stub = Document::stub(source.id, entry.url.clone());
                    let document = self.documents.upsert_stub(&stub).await?;
                    let fetch = Task::fetch(source.id, document.id, document.url.clone());
                    self.repository.create(&fetch).await?;
                    materialized += 1;
                }

                info!(
                    "Discovery for {} via {:?}: {} accepted URLs, {} fetch tasks",
                    source.root_url,
                    report.strategy,
                    accepted.len(),
                    materialized
                );
                counter!("discovery_runs_total", "outcome" => "success").increment(1);

                source.record_run();
                self.sources.update(&source).await?;
                self.repository.mark_completed(task.id).await?;
            }
            Err(e) => {
                warn!("Discovery run failed for {}: {}", source.root_url, e);
                counter!("discovery_runs_total", "outcome" => "failure").increment(1);

                source.record_failure();
                self.sources.update(&source).await?;
                retry_or_park(task, &self.repository, &self.retry_policy).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Worker for DiscoveryWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!("Discovery worker {} started", self.worker_id);
        loop {
            match self.process_next().await {
                Ok(processed) => {
                    if !processed {
                        sleep(Duration::from_secs(1)).await;
                    }
                }
                Err(e) => {
                    error!("Error processing discovery task: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "discovery_worker"
    }
}
