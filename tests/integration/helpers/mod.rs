// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 集成测试的内存仓库与脚本化提供商

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huntrs::config::settings::{
    DiscoverySettings, FetcherSettings, OrchestratorSettings, SchedulerSettings,
};
use huntrs::domain::models::document::{Document, EnrichmentStatus};
use huntrs::domain::models::enrichment::EnrichmentResult;
use huntrs::domain::models::promotion::PromotionRecord;
use huntrs::domain::models::source::{Source, SourceStatus};
use huntrs::domain::models::task::{Task, TaskStatus, TaskType};
use huntrs::domain::repositories::document_repository::DocumentRepository;
use huntrs::domain::repositories::enrichment_repository::EnrichmentRepository;
use huntrs::domain::repositories::promotion_repository::PromotionRepository;
use huntrs::domain::repositories::source_repository::SourceRepository;
use huntrs::domain::repositories::task_repository::TaskRepository;
use huntrs::providers::health::HealthRegistry;
use huntrs::providers::traits::{
    ChatRequest, EmbeddingProvider, ProviderError, ReasoningProvider, SearchHit, SearchProvider,
};
use huntrs::providers::waterfall::ProviderWaterfall;
use huntrs::utils::errors::RepositoryError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// 内存仓库
// ---------------------------------------------------------------------------

/// 内存任务仓库
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<Uuid, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Task> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn by_type(&self, task_type: TaskType) -> Vec<Task> {
        self.tasks
            .lock()
            .values()
            .filter(|t| t.task_type == task_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, RepositoryError> {
        self.tasks.lock().insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.lock().get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> Result<Task, RepositoryError> {
        let mut tasks = self.tasks.lock();
        if !tasks.contains_key(&task.id) {
            return Err(RepositoryError::NotFound);
        }
        tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn acquire_next(
        &self,
        worker_id: Uuid,
        task_type: TaskType,
    ) -> Result<Option<Task>, RepositoryError> {
        let mut tasks = self.tasks.lock();
        let now = Utc::now();

        let mut candidates: Vec<&Task> = tasks
            .values()
            .filter(|t| {
                t.task_type == task_type
                    && t.status == TaskStatus::Queued
                    && t.scheduled_at
                        .map(|at| at.with_timezone(&Utc) <= now)
                        .unwrap_or(true)
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });

        let Some(id) = candidates.first().map(|t| t.id) else {
            return Ok(None);
        };

        let task = tasks.get_mut(&id).unwrap();
        task.status = TaskStatus::Active;
        task.lock_token = Some(worker_id);
        task.lock_expires_at = Some((now + chrono::Duration::minutes(5)).into());
        task.started_at = Some(now.into());
        task.attempt_count += 1;
        task.updated_at = now.into();
        Ok(Some(task.clone()))
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now().into());
        task.lock_token = None;
        task.lock_expires_at = None;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        task.status = TaskStatus::Failed;
        task.completed_at = Some(Utc::now().into());
        task.lock_token = None;
        task.lock_expires_at = None;
        Ok(())
    }

    async fn reset_stuck_tasks(&self, timeout: chrono::Duration) -> Result<u64, RepositoryError> {
        let mut tasks = self.tasks.lock();
        let now = Utc::now();
        let threshold = now - timeout;
        let mut reset = 0u64;
        for task in tasks.values_mut() {
            if task.status != TaskStatus::Active {
                continue;
            }
            let expired = match (task.lock_expires_at, task.started_at) {
                (Some(lock), _) => lock.with_timezone(&Utc) <= now,
                (None, Some(started)) => started.with_timezone(&Utc) <= threshold,
                _ => false,
            };
            if expired {
                task.status = TaskStatus::Queued;
                task.lock_token = None;
                task.lock_expires_at = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn expire_tasks(&self) -> Result<u64, RepositoryError> {
        let mut tasks = self.tasks.lock();
        let now = Utc::now();
        let mut expired = 0u64;
        for task in tasks.values_mut() {
            if task.status == TaskStatus::Queued {
                if let Some(at) = task.expires_at {
                    if at.with_timezone(&Utc) <= now {
                        task.status = TaskStatus::Cancelled;
                        task.completed_at = Some(now.into());
                        expired += 1;
                    }
                }
            }
        }
        Ok(expired)
    }

    async fn count_by_status(
        &self,
        task_type: TaskType,
        status: TaskStatus,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.task_type == task_type && t.status == status)
            .count() as u64)
    }
}

/// 内存来源仓库
#[derive(Default)]
pub struct InMemorySourceRepository {
    sources: Mutex<HashMap<Uuid, Source>>,
}

impl InMemorySourceRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SourceRepository for InMemorySourceRepository {
    async fn create(&self, source: &Source) -> Result<Source, RepositoryError> {
        let mut sources = self.sources.lock();
        if sources.values().any(|s| s.root_url == source.root_url) {
            return Err(RepositoryError::AlreadyExists);
        }
        sources.insert(source.id, source.clone());
        Ok(source.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Source>, RepositoryError> {
        Ok(self.sources.lock().get(&id).cloned())
    }

    async fn find_by_root_url(&self, root_url: &str) -> Result<Option<Source>, RepositoryError> {
        Ok(self
            .sources
            .lock()
            .values()
            .find(|s| s.root_url == root_url)
            .cloned())
    }

    async fn update(&self, source: &Source) -> Result<Source, RepositoryError> {
        let mut sources = self.sources.lock();
        if !sources.contains_key(&source.id) {
            return Err(RepositoryError::NotFound);
        }
        sources.insert(source.id, source.clone());
        Ok(source.clone())
    }

    async fn list(&self, status: Option<SourceStatus>) -> Result<Vec<Source>, RepositoryError> {
        let mut out: Vec<Source> = self
            .sources
            .lock()
            .values()
            .filter(|s| status.map(|st| s.status == st).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Source>, RepositoryError> {
        Ok(self
            .sources
            .lock()
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect())
    }
}

/// 内存文档仓库
#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: Mutex<HashMap<Uuid, Document>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Document> {
        self.documents.lock().values().cloned().collect()
    }

    pub fn source_of(&self, document_id: Uuid) -> Option<Uuid> {
        self.documents
            .lock()
            .get(&document_id)
            .map(|d| d.source_id)
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn upsert_stub(&self, document: &Document) -> Result<Document, RepositoryError> {
        let mut documents = self.documents.lock();
        if let Some(existing) = documents
            .values()
            .find(|d| d.source_id == document.source_id && d.url == document.url)
        {
            return Ok(existing.clone());
        }
        documents.insert(document.id, document.clone());
        Ok(document.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        Ok(self.documents.lock().get(&id).cloned())
    }

    async fn find_by_source_and_url(
        &self,
        source_id: Uuid,
        url: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .values()
            .find(|d| d.source_id == source_id && d.url == url)
            .cloned())
    }

    async fn url_exists(&self, url: &str) -> Result<bool, RepositoryError> {
        Ok(self.documents.lock().values().any(|d| d.url == url))
    }

    async fn update(&self, document: &Document) -> Result<Document, RepositoryError> {
        let mut documents = self.documents.lock();
        if !documents.contains_key(&document.id) {
            return Err(RepositoryError::NotFound);
        }
        documents.insert(document.id, document.clone());
        Ok(document.clone())
    }

    async fn set_enrichment_status_cas(
        &self,
        id: Uuid,
        expected_hash: &str,
        status: EnrichmentStatus,
    ) -> Result<u64, RepositoryError> {
        let mut documents = self.documents.lock();
        let Some(document) = documents.get_mut(&id) else {
            return Ok(0);
        };
        if document.content_hash.as_deref() != Some(expected_hash) {
            return Ok(0);
        }
        document.enrichment_status = status;
        document.updated_at = Utc::now().into();
        Ok(1)
    }

    async fn count_enriched_for_source(&self, source_id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .values()
            .filter(|d| {
                d.source_id == source_id && d.enrichment_status == EnrichmentStatus::Enriched
            })
            .count() as u64)
    }
}

/// 内存富化结果仓库
///
/// 价值信号统计需要文档→来源的映射，持有文档仓库的句柄
pub struct InMemoryEnrichmentRepository {
    results: Mutex<HashMap<Uuid, EnrichmentResult>>,
    documents: Arc<InMemoryDocumentRepository>,
}

impl InMemoryEnrichmentRepository {
    pub fn new(documents: Arc<InMemoryDocumentRepository>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(HashMap::new()),
            documents,
        })
    }
}

#[async_trait]
impl EnrichmentRepository for InMemoryEnrichmentRepository {
    async fn upsert(&self, result: &EnrichmentResult) -> Result<EnrichmentResult, RepositoryError> {
        self.results
            .lock()
            .insert(result.document_id, result.clone());
        Ok(result.clone())
    }

    async fn find_by_document(
        &self,
        document_id: Uuid,
    ) -> Result<Option<EnrichmentResult>, RepositoryError> {
        Ok(self.results.lock().get(&document_id).cloned())
    }

    async fn find_by_documents(
        &self,
        document_ids: &[Uuid],
    ) -> Result<Vec<EnrichmentResult>, RepositoryError> {
        let results = self.results.lock();
        Ok(document_ids
            .iter()
            .filter_map(|id| results.get(id).cloned())
            .collect())
    }

    async fn count_high_urgency_for_source(
        &self,
        source_id: Uuid,
        urgency_floor: i32,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let results = self.results.lock();
        Ok(results
            .values()
            .filter(|r| {
                r.urgency >= urgency_floor
                    && r.enriched_at.with_timezone(&Utc) >= since
                    && self.documents.source_of(r.document_id) == Some(source_id)
            })
            .count() as u64)
    }
}

/// 内存晋升记录仓库
#[derive(Default)]
pub struct InMemoryPromotionRepository {
    records: Mutex<Vec<PromotionRecord>>,
}

impl InMemoryPromotionRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<PromotionRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl PromotionRepository for InMemoryPromotionRepository {
    async fn create(&self, record: &PromotionRecord) -> Result<PromotionRecord, RepositoryError> {
        self.records.lock().push(record.clone());
        Ok(record.clone())
    }

    async fn list_for_source(
        &self,
        source_id: Uuid,
    ) -> Result<Vec<PromotionRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.source_id == source_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// 脚本化提供商
// ---------------------------------------------------------------------------

/// 脚本化推理提供商：按顺序弹出预设结果，用尽后返回默认值
pub struct ScriptedReasoner {
    name: &'static str,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    default: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(name: &'static str, script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            default: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// 永远返回同一段文本的提供商
    pub fn constant(name: &'static str, output: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(VecDeque::new()),
            default: Some(output.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedReasoner {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(item) = self.script.lock().pop_front() {
            return item;
        }
        match &self.default {
            Some(output) => Ok(output.clone()),
            None => Err(ProviderError::ServerError(500)),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// 固定向量的向量化提供商
pub struct ConstEmbedder {
    name: &'static str,
    vector: Vec<f32>,
    pub calls: AtomicUsize,
}

impl ConstEmbedder {
    pub fn new(name: &'static str, vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            name,
            vector,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ConstEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// 固定结果的搜索提供商
pub struct ScriptedSearcher {
    name: &'static str,
    hits: Vec<SearchHit>,
    pub calls: AtomicUsize,
}

impl ScriptedSearcher {
    pub fn new(name: &'static str, urls: &[&str]) -> Arc<Self> {
        let hits = urls
            .iter()
            .map(|u| SearchHit {
                title: format!("Result for {}", u),
                url: u.to_string(),
                snippet: None,
            })
            .collect();
        Arc::new(Self {
            name,
            hits,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearcher {
    async fn search(&self, _query: &str, limit: u32) -> Result<Vec<SearchHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(limit as usize).cloned().collect())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

// ---------------------------------------------------------------------------
// 组装辅助
// ---------------------------------------------------------------------------

/// 合法的富化输出JSON
pub fn valid_annotation_json(urgency: i32) -> String {
    format!(
        r#"{{"summary": "Concise summary of the article.", "tags": ["alpha", "beta"], "category": "Technology", "urgency": {}}}"#,
        urgency
    )
}

/// 用给定链组装瀑布（测试用的短冷却）
pub fn waterfall_with(
    reasoning: Vec<Arc<dyn ReasoningProvider>>,
    embedding: Vec<Arc<dyn EmbeddingProvider>>,
    search: Vec<Arc<dyn SearchProvider>>,
) -> Arc<ProviderWaterfall> {
    let health = Arc::new(HealthRegistry::new(
        Duration::from_secs(30),
        Duration::from_secs(900),
    ));
    Arc::new(ProviderWaterfall::new(
        reasoning, embedding, search, health, 600, 3000,
    ))
}

pub fn scheduler_settings() -> SchedulerSettings {
    SchedulerSettings {
        beat_interval_secs: 60,
        default_interval_secs: 3600,
        promoted_interval_secs: 1800,
        promotion_threshold: 3,
        promotion_urgency_floor: 7,
        evaluation_window_secs: 7 * 24 * 3600,
        failure_streak_limit: 5,
        fast_interval_secs: 300,
        medium_interval_secs: 1800,
        max_interval_secs: 86400,
        stuck_task_timeout_secs: 1800,
    }
}

pub fn orchestrator_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        audit_limit: 5,
        synthesis_limit: 10,
        min_coverage_hits: 3,
        similarity_threshold: 0.35,
        gap_fill_limit: 5,
        search_results_per_query: 3,
        wait_timeout_secs: 2,
        poll_interval_secs: 1,
        early_exit_after_secs: 1,
        low_signal_domains: vec!["pinterest.com".to_string()],
    }
}

pub fn discovery_settings() -> DiscoverySettings {
    DiscoverySettings {
        sitemap_recency_secs: 48 * 3600,
        sitemap_fetch_budget: 5,
        default_depth_limit: 2,
        page_budget: 30,
        deadline_secs: 30,
        concurrency: 2,
        max_documents_per_run: 50,
        navigation_link_threshold: 40,
        exclude_patterns: vec![
            "/ads/".to_string(),
            "/ad/".to_string(),
            "/tag/".to_string(),
            "login".to_string(),
            "youtube.com".to_string(),
        ],
        sitemap_priority_terms: vec!["news".to_string()],
        sitemap_skip_terms: Vec::new(),
    }
}

pub fn fetcher_settings() -> FetcherSettings {
    FetcherSettings {
        user_agent: "huntrs-bot/1.0 (+https://huntrs.dev)".to_string(),
        timeout_secs: 5,
        max_body_bytes: 1024 * 1024,
        default_crawl_delay_secs: 0,
    }
}
