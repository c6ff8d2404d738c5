// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 进化循环：候选评估、晋升单调性与失败暂停

use crate::helpers::{
    scheduler_settings, InMemoryDocumentRepository, InMemoryEnrichmentRepository,
    InMemoryPromotionRepository, InMemorySourceRepository, InMemoryTaskRepository,
};
use chrono::Utc;
use huntrs::domain::models::document::{Document, EnrichmentStatus};
use huntrs::domain::models::enrichment::EnrichmentResult;
use huntrs::domain::models::source::{Source, SourceStatus};
use huntrs::domain::models::task::TaskType;
use huntrs::domain::repositories::document_repository::DocumentRepository;
use huntrs::domain::repositories::enrichment_repository::EnrichmentRepository;
use huntrs::domain::repositories::source_repository::SourceRepository;
use huntrs::queue::scheduler::EvolutionScheduler;
use huntrs::queue::task_queue::PostgresTaskQueue;
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    tasks: Arc<InMemoryTaskRepository>,
    sources: Arc<InMemorySourceRepository>,
    documents: Arc<InMemoryDocumentRepository>,
    enrichments: Arc<InMemoryEnrichmentRepository>,
    promotions: Arc<InMemoryPromotionRepository>,
    scheduler: EvolutionScheduler,
}

fn fixture() -> Fixture {
    let tasks = InMemoryTaskRepository::new();
    let sources = InMemorySourceRepository::new();
    let documents = InMemoryDocumentRepository::new();
    let enrichments = InMemoryEnrichmentRepository::new(documents.clone());
    let promotions = InMemoryPromotionRepository::new();
    let queue = Arc::new(PostgresTaskQueue::new(tasks.clone()));

    let scheduler = EvolutionScheduler::new(
        sources.clone(),
        enrichments.clone(),
        promotions.clone(),
        tasks.clone(),
        queue,
        scheduler_settings(),
    );

    Fixture {
        tasks,
        sources,
        documents,
        enrichments,
        promotions,
        scheduler,
    }
}

/// 为来源植入一篇已富化的文档
async fn seed_enriched_document(fixture: &Fixture, source_id: Uuid, urgency: i32) -> Uuid {
    let mut document = Document::stub(
        source_id,
        format!("https://example.com/2026/01/{}", Uuid::new_v4()),
    );
    document.content_hash = Some("h".to_string());
    document.enrichment_status = EnrichmentStatus::Enriched;
    let document = fixture.documents.upsert_stub(&document).await.unwrap();

    let result = EnrichmentResult::new(
        document.id,
        "mock".to_string(),
        urgency,
        "Technology".to_string(),
        "Summary.".to_string(),
        vec![],
    );
    fixture.enrichments.upsert(&result).await.unwrap();
    document.id
}

#[tokio::test]
async fn candidate_with_enough_value_signal_is_promoted() {
    let fixture = fixture();
    let candidate = Source::new_candidate(
        "https://example.com".to_string(),
        2,
        Some("6G technology".to_string()),
    );
    fixture.sources.create(&candidate).await.unwrap();

    for _ in 0..3 {
        seed_enriched_document(&fixture, candidate.id, 9).await;
    }

    // 第一次心跳：candidate → evaluating
    fixture.scheduler.tick().await;
    let source = fixture
        .sources
        .find_by_id(candidate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, SourceStatus::Evaluating);
    assert!(source.evaluation_started_at.is_some());

    // 第二次心跳：价值信号达到阈值，evaluating → promoted
    fixture.scheduler.tick().await;
    let source = fixture
        .sources
        .find_by_id(candidate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, SourceStatus::Promoted);
    assert_eq!(source.schedule_interval_secs, Some(1800));

    let records = fixture.promotions.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_id, candidate.id);
    assert_eq!(records[0].value_score, 3);
    assert_eq!(
        records[0].originating_query.as_deref(),
        Some("6G technology")
    );
}

#[tokio::test]
async fn promotion_is_monotonic_across_ticks() {
    let fixture = fixture();
    let candidate = Source::new_candidate("https://example.com".to_string(), 2, None);
    fixture.sources.create(&candidate).await.unwrap();
    for _ in 0..3 {
        seed_enriched_document(&fixture, candidate.id, 9).await;
    }

    fixture.scheduler.tick().await;
    fixture.scheduler.tick().await;

    // 之后的心跳不会把promoted来源自动降回candidate/discarded
    for _ in 0..5 {
        fixture.scheduler.tick().await;
        let source = fixture
            .sources
            .find_by_id(candidate.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.status, SourceStatus::Promoted);
    }
    assert_eq!(fixture.promotions.all().len(), 1);
}

#[tokio::test]
async fn low_value_candidate_is_discarded_after_window() {
    let fixture = fixture();
    let candidate = Source::new_candidate("https://example.com".to_string(), 2, None);
    fixture.sources.create(&candidate).await.unwrap();
    seed_enriched_document(&fixture, candidate.id, 2).await;

    fixture.scheduler.tick().await;
    let mut source = fixture
        .sources
        .find_by_id(candidate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, SourceStatus::Evaluating);

    // 把评估开始时间拨回窗口之外
    source.evaluation_started_at = Some((Utc::now() - chrono::Duration::days(8)).into());
    fixture.sources.update(&source).await.unwrap();

    fixture.scheduler.tick().await;
    let source = fixture
        .sources
        .find_by_id(candidate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, SourceStatus::Discarded);
    assert!(fixture.promotions.all().is_empty());
}

#[tokio::test]
async fn failure_streak_pauses_promoted_source() {
    let fixture = fixture();
    let candidate = Source::new_candidate("https://example.com".to_string(), 2, None);
    fixture.sources.create(&candidate).await.unwrap();
    for _ in 0..3 {
        seed_enriched_document(&fixture, candidate.id, 9).await;
    }
    fixture.scheduler.tick().await;
    fixture.scheduler.tick().await;

    let mut source = fixture
        .sources
        .find_by_id(candidate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, SourceStatus::Promoted);

    // 连续失败达到上限后，下一次心跳暂停该来源
    source.consecutive_failures = 5;
    fixture.sources.update(&source).await.unwrap();
    fixture.scheduler.tick().await;

    let source = fixture
        .sources
        .find_by_id(candidate.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.status, SourceStatus::Paused);
}

#[tokio::test]
async fn due_sources_are_dispatched_as_discovery_tasks() {
    let fixture = fixture();
    let source = Source::new_manual(
        "https://example.com".to_string(),
        huntrs::domain::models::source::DiscoveryMode::Auto,
        2,
        3600,
    );
    fixture.sources.create(&source).await.unwrap();

    fixture.scheduler.tick().await;

    let discovery_tasks = fixture.tasks.by_type(TaskType::Discovery);
    assert_eq!(discovery_tasks.len(), 1);
    assert_eq!(discovery_tasks[0].source_id, Some(source.id));

    // last_run已更新：下一次心跳不会重复派发
    fixture.scheduler.tick().await;
    assert_eq!(fixture.tasks.by_type(TaskType::Discovery).len(), 1);
}
