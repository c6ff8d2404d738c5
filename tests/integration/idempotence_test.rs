// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 内容哈希幂等：未变化的文档最多触发一次瀑布调用

use crate::helpers::{
    fetcher_settings, scheduler_settings, valid_annotation_json, waterfall_with, ConstEmbedder,
    InMemoryDocumentRepository, InMemoryEnrichmentRepository, InMemorySourceRepository,
    InMemoryTaskRepository, ScriptedReasoner,
};
use huntrs::domain::models::document::{Document, EnrichmentStatus, ExtractionStatus};
use huntrs::domain::models::source::{DiscoveryMode, Source};
use huntrs::domain::models::task::{Task, TaskStatus, TaskType};
use huntrs::domain::repositories::document_repository::DocumentRepository;
use huntrs::domain::repositories::source_repository::SourceRepository;
use huntrs::domain::repositories::task_repository::TaskRepository;
use huntrs::engines::Fetcher;
use huntrs::extraction::{Extractor, HtmlExtractor};
use huntrs::providers::traits::{EmbeddingProvider, ReasoningProvider};
use huntrs::utils::robots::RobotsChecker;
use huntrs::vector::InMemoryVectorStore;
use huntrs::workers::enrich_worker::EnrichWorker;
use huntrs::workers::fetch_worker::FetchWorker;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct EnrichFixture {
    tasks: Arc<InMemoryTaskRepository>,
    documents: Arc<InMemoryDocumentRepository>,
    sources: Arc<InMemorySourceRepository>,
    reasoner: Arc<ScriptedReasoner>,
    vector: Arc<InMemoryVectorStore>,
    worker: EnrichWorker,
}

async fn enrich_fixture(urgency: i32) -> EnrichFixture {
    let tasks = InMemoryTaskRepository::new();
    let documents = InMemoryDocumentRepository::new();
    let sources = InMemorySourceRepository::new();
    let enrichments = InMemoryEnrichmentRepository::new(documents.clone());
    let reasoner = ScriptedReasoner::constant("mock", &valid_annotation_json(urgency));
    let embedder = ConstEmbedder::new("mock", vec![1.0, 0.0, 0.5]);
    let waterfall = waterfall_with(
        vec![reasoner.clone() as Arc<dyn ReasoningProvider>],
        vec![embedder as Arc<dyn EmbeddingProvider>],
        vec![],
    );
    let vector = Arc::new(InMemoryVectorStore::new());

    let worker = EnrichWorker::new(
        tasks.clone(),
        documents.clone(),
        enrichments.clone(),
        sources.clone(),
        waterfall,
        vector.clone(),
        scheduler_settings(),
    );

    EnrichFixture {
        tasks,
        documents,
        sources,
        reasoner,
        vector,
        worker,
    }
}

async fn seed_document(fixture: &EnrichFixture, hash: &str) -> Document {
    let source = Source::new_manual(
        "https://example.com".to_string(),
        DiscoveryMode::Auto,
        2,
        3600,
    );
    fixture.sources.create(&source).await.unwrap();

    let mut document = Document::stub(source.id, "https://example.com/2026/01/a".to_string());
    document.title = Some("Title".to_string());
    document.text = Some("Body text long enough to analyze.".to_string());
    document.content_hash = Some(hash.to_string());
    document.extraction_status = ExtractionStatus::Extracted;
    fixture.documents.upsert_stub(&document).await.unwrap()
}

#[tokio::test]
async fn unchanged_hash_invokes_waterfall_at_most_once() {
    let fixture = enrich_fixture(8).await;
    let document = seed_document(&fixture, "h1").await;

    let task = Task::enrich(
        document.source_id,
        document.id,
        document.url.clone(),
        "h1",
    );
    fixture.tasks.create(&task).await.unwrap();

    assert!(fixture.worker.process_next().await.unwrap());
    assert_eq!(fixture.reasoner.call_count(), 1);

    let enriched = fixture
        .documents
        .find_by_id(document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enriched.enrichment_status, EnrichmentStatus::Enriched);
    assert_eq!(fixture.vector.len(), 1);

    // 同一哈希的第二个富化任务是无操作：瀑布不再被调用
    let second = Task::enrich(
        document.source_id,
        document.id,
        document.url.clone(),
        "h1",
    );
    fixture.tasks.create(&second).await.unwrap();
    assert!(fixture.worker.process_next().await.unwrap());

    assert_eq!(fixture.reasoner.call_count(), 1);
    let done = fixture.tasks.find_by_id(second.id).await.unwrap().unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
}

#[tokio::test]
async fn stale_enrich_task_is_dropped_without_provider_call() {
    let fixture = enrich_fixture(5).await;
    let document = seed_document(&fixture, "h2").await;

    // 任务携带的是入队时的旧哈希，内容已被更新的抓取覆盖
    let stale = Task::enrich(
        document.source_id,
        document.id,
        document.url.clone(),
        "h1-outdated",
    );
    fixture.tasks.create(&stale).await.unwrap();

    assert!(fixture.worker.process_next().await.unwrap());
    assert_eq!(fixture.reasoner.call_count(), 0);

    let doc = fixture
        .documents
        .find_by_id(document.id)
        .await
        .unwrap()
        .unwrap();
    // 原状态保留，没有被过期任务改写
    assert_eq!(doc.enrichment_status, EnrichmentStatus::Pending);
}

#[tokio::test]
async fn high_urgency_speeds_up_source_interval() {
    let fixture = enrich_fixture(9).await;
    let document = seed_document(&fixture, "h3").await;

    let task = Task::enrich(
        document.source_id,
        document.id,
        document.url.clone(),
        "h3",
    );
    fixture.tasks.create(&task).await.unwrap();
    assert!(fixture.worker.process_next().await.unwrap());

    let source = fixture
        .sources
        .find_by_id(document.source_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.schedule_interval_secs, Some(300));
}

/// 抓取链路：提取成功且哈希变化才派发富化任务；
/// 重抓同样内容不会产生第二个富化任务
#[tokio::test]
async fn fetch_chains_to_enrich_only_on_hash_change() {
    let server = MockServer::start().await;
    let article = r#"<html><head><title>Chained</title></head><body>
        <article>
          <p>This first paragraph is long enough to be treated as real article content.</p>
          <p>The second paragraph also clears the extraction length filter comfortably.</p>
        </article></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/2026/01/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article))
        .mount(&server)
        .await;

    let tasks = InMemoryTaskRepository::new();
    let documents = InMemoryDocumentRepository::new();
    let sources = InMemorySourceRepository::new();

    let settings = fetcher_settings();
    let robots = Arc::new(RobotsChecker::new(settings.user_agent.clone()));
    let fetcher = Arc::new(Fetcher::new(&settings, robots));
    let extractor: Arc<dyn Extractor> = Arc::new(HtmlExtractor::new());
    let worker = FetchWorker::new(tasks.clone(), documents.clone(), fetcher, extractor);

    let source = Source::new_manual(server.uri(), DiscoveryMode::Auto, 2, 3600);
    sources.create(&source).await.unwrap();
    let stub = Document::stub(source.id, format!("{}/2026/01/a", server.uri()));
    let document = documents.upsert_stub(&stub).await.unwrap();

    let fetch_task = Task::fetch(source.id, document.id, document.url.clone());
    tasks.create(&fetch_task).await.unwrap();
    assert!(worker.process_next().await.unwrap());

    let enrich_tasks = tasks.by_type(TaskType::Enrich);
    assert_eq!(enrich_tasks.len(), 1);
    let hash = enrich_tasks[0].payload["content_hash"].as_str().unwrap();
    assert!(!hash.is_empty());

    let doc = documents.find_by_id(document.id).await.unwrap().unwrap();
    assert_eq!(doc.extraction_status, ExtractionStatus::Extracted);
    assert_eq!(doc.content_hash.as_deref(), Some(hash));

    // 内容未变化的重新抓取：不派发第二个富化任务
    let refetch = Task::fetch(source.id, document.id, document.url.clone());
    tasks.create(&refetch).await.unwrap();
    assert!(worker.process_next().await.unwrap());

    assert_eq!(tasks.by_type(TaskType::Enrich).len(), 1);
}
