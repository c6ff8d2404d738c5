// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 编排器：审计覆盖、补缺注册与低置信度标注

use crate::helpers::{
    orchestrator_settings, waterfall_with, ConstEmbedder, InMemoryDocumentRepository,
    InMemoryEnrichmentRepository, InMemorySourceRepository, InMemoryTaskRepository,
    ScriptedReasoner, ScriptedSearcher,
};
use huntrs::domain::models::document::{Document, EnrichmentStatus};
use huntrs::domain::models::enrichment::EnrichmentResult;
use huntrs::domain::models::source::{DiscoveryMode, Source, SourceStatus};
use huntrs::domain::models::task::TaskType;
use huntrs::domain::repositories::document_repository::DocumentRepository;
use huntrs::domain::repositories::enrichment_repository::EnrichmentRepository;
use huntrs::domain::repositories::source_repository::SourceRepository;
use huntrs::orchestrator::Orchestrator;
use huntrs::providers::traits::{EmbeddingProvider, ReasoningProvider, SearchProvider};
use huntrs::vector::{InMemoryVectorStore, VectorStore};
use std::sync::Arc;

struct Fixture {
    tasks: Arc<InMemoryTaskRepository>,
    sources: Arc<InMemorySourceRepository>,
    documents: Arc<InMemoryDocumentRepository>,
    enrichments: Arc<InMemoryEnrichmentRepository>,
    vector: Arc<InMemoryVectorStore>,
    searcher: Arc<ScriptedSearcher>,
    orchestrator: Orchestrator,
}

fn fixture(reasoner: Arc<ScriptedReasoner>, search_urls: &[&str]) -> Fixture {
    let tasks = InMemoryTaskRepository::new();
    let sources = InMemorySourceRepository::new();
    let documents = InMemoryDocumentRepository::new();
    let enrichments = InMemoryEnrichmentRepository::new(documents.clone());
    let vector = Arc::new(InMemoryVectorStore::new());
    let searcher = ScriptedSearcher::new("mock-search", search_urls);
    let embedder = ConstEmbedder::new("mock-embed", vec![1.0, 0.0, 0.0]);

    let waterfall = waterfall_with(
        vec![reasoner as Arc<dyn ReasoningProvider>],
        vec![embedder as Arc<dyn EmbeddingProvider>],
        vec![searcher.clone() as Arc<dyn SearchProvider>],
    );

    let orchestrator = Orchestrator::new(
        waterfall,
        vector.clone(),
        documents.clone(),
        enrichments.clone(),
        sources.clone(),
        tasks.clone(),
        orchestrator_settings(),
        vec!["/tag/".to_string(), "/ad/".to_string()],
        2,
    );

    Fixture {
        tasks,
        sources,
        documents,
        enrichments,
        vector,
        searcher,
        orchestrator,
    }
}

/// 零覆盖的问题触发补缺；等待超时后答案被标注为低置信度
#[tokio::test]
async fn zero_coverage_triggers_gap_fill_and_low_confidence_answer() {
    let reasoner = ScriptedReasoner::constant(
        "mock-reason",
        "6G spectrum allocation\n6G standardization timeline\n6G field trials",
    );
    let fixture = fixture(
        reasoner,
        &[
            "https://telecom.example.com/2026/01/6g-trials",
            "https://spectrum.example.org/2026/02/6g-bands",
            "https://standards.example.net/2026/03/6g-roadmap",
        ],
    );

    let report = fixture.orchestrator.answer("6G technology").await;

    // 补缺注册了3个新URL，每个成为候选来源下的文档桩+抓取任务
    assert_eq!(report.gap_filled_urls.len(), 3);
    assert_eq!(fixture.searcher.call_count(), 3);
    assert_eq!(fixture.tasks.by_type(TaskType::Fetch).len(), 3);
    assert_eq!(fixture.documents.all().len(), 3);

    let candidates = fixture
        .sources
        .list(Some(SourceStatus::Candidate))
        .await
        .unwrap();
    assert_eq!(candidates.len(), 3);
    assert!(candidates
        .iter()
        .all(|s| s.originating_query.as_deref() == Some("6G technology")));

    // 没有工作器在跑，等待超时后以低置信度回答而不是报错
    assert!(report.low_confidence);
    assert!(!report.answer.is_empty());
    assert!(report.cited_documents.is_empty());
}

/// 覆盖充分时直接进入综合阶段，不触发任何搜索
#[tokio::test]
async fn sufficient_coverage_skips_gap_fill() {
    let reasoner = ScriptedReasoner::constant(
        "mock-reason",
        "Based on the corpus, the answer is X. [doc:a] \n\nReferences: a, b, c",
    );
    let fixture = fixture(reasoner, &["https://unused.example.com/2026/01/x"]);

    let source = Source::new_manual(
        "https://known.example.com".to_string(),
        DiscoveryMode::Auto,
        2,
        3600,
    );
    fixture.sources.create(&source).await.unwrap();

    for i in 0..3 {
        let mut document = Document::stub(
            source.id,
            format!("https://known.example.com/2026/01/doc-{}", i),
        );
        document.title = Some(format!("Doc {}", i));
        document.content_hash = Some("h".to_string());
        document.enrichment_status = EnrichmentStatus::Enriched;
        let document = fixture.documents.upsert_stub(&document).await.unwrap();

        let result = EnrichmentResult::new(
            document.id,
            "mock".to_string(),
            6,
            "Technology".to_string(),
            format!("Summary {}.", i),
            vec!["6g".to_string()],
        );
        fixture.enrichments.upsert(&result).await.unwrap();
        fixture
            .vector
            .upsert(document.id, vec![1.0, 0.0, 0.0], serde_json::json!({}))
            .await
            .unwrap();
    }

    let report = fixture.orchestrator.answer("6G technology").await;

    assert!(!report.low_confidence);
    assert_eq!(fixture.searcher.call_count(), 0);
    assert!(report.gap_filled_urls.is_empty());
    assert_eq!(report.cited_documents.len(), 3);
    assert!(report.answer.contains("the answer is X"));
}

/// 补缺过滤：已知URL、低信号域名与排除模式都不被注册
#[tokio::test]
async fn gap_fill_filters_known_and_low_signal_urls() {
    let reasoner = ScriptedReasoner::constant("mock-reason", "query one");
    let fixture = fixture(
        reasoner,
        &[
            "https://fresh.example.com/2026/01/new-story",
            "https://seen.example.com/2026/01/already-known",
            "https://pinterest.com/2026/01/pin",
        ],
    );

    // 预先登记一篇已知文档
    let source = Source::new_candidate("https://seen.example.com".to_string(), 2, None);
    fixture.sources.create(&source).await.unwrap();
    let known = Document::stub(
        source.id,
        "https://seen.example.com/2026/01/already-known".to_string(),
    );
    fixture.documents.upsert_stub(&known).await.unwrap();

    let report = fixture.orchestrator.answer("anything").await;

    assert_eq!(report.gap_filled_urls.len(), 1);
    assert!(report.gap_filled_urls[0].contains("fresh.example.com"));
}
