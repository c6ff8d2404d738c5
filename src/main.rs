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

use huntrs::config::settings::Settings;
use huntrs::discovery::DiscoveryEngine;
use huntrs::domain::repositories::document_repository::DocumentRepository;
use huntrs::domain::repositories::enrichment_repository::EnrichmentRepository;
use huntrs::domain::repositories::promotion_repository::PromotionRepository;
use huntrs::domain::repositories::source_repository::SourceRepository;
use huntrs::domain::repositories::task_repository::TaskRepository;
use huntrs::engines::Fetcher;
use huntrs::extraction::{Extractor, HtmlExtractor};
use huntrs::infrastructure::database::connection;
use huntrs::infrastructure::repositories::document_repo_impl::DocumentRepositoryImpl;
use huntrs::infrastructure::repositories::enrichment_repo_impl::EnrichmentRepositoryImpl;
use huntrs::infrastructure::repositories::promotion_repo_impl::PromotionRepositoryImpl;
use huntrs::infrastructure::repositories::source_repo_impl::SourceRepositoryImpl;
use huntrs::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use huntrs::orchestrator::Orchestrator;
use huntrs::presentation::{routes, AppState};
use huntrs::providers::traits::Capability;
use huntrs::queue::scheduler::EvolutionScheduler;
use huntrs::queue::task_queue::{PostgresTaskQueue, TaskQueue};
use huntrs::utils::robots::RobotsChecker;
use huntrs::utils::telemetry;
use huntrs::vector::{InMemoryVectorStore, VectorStore};
use huntrs::workers::discovery_worker::DiscoveryWorker;
use huntrs::workers::enrich_worker::EnrichWorker;
use huntrs::workers::fetch_worker::FetchWorker;
use huntrs::workers::manager::WorkerManager;
use huntrs::workers::worker::Worker;
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting huntrs...");

    // Initialize Prometheus Metrics
    huntrs::infrastructure::metrics::init_metrics();

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Connect to database and run migrations
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Assemble the provider waterfall
    // 推理与搜索缺一不可；没有任何凭据属于致命配置错误
    let waterfall = huntrs::providers::build_waterfall(
        &settings.providers,
        &[Capability::Reasoning, Capability::Search],
    )?;
    let health = waterfall.health();

    // 5. Repositories and queue
    let task_repo: Arc<dyn TaskRepository> = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let source_repo: Arc<dyn SourceRepository> = Arc::new(SourceRepositoryImpl::new(db.clone()));
    let document_repo: Arc<dyn DocumentRepository> =
        Arc::new(DocumentRepositoryImpl::new(db.clone()));
    let enrichment_repo: Arc<dyn EnrichmentRepository> =
        Arc::new(EnrichmentRepositoryImpl::new(db.clone()));
    let promotion_repo: Arc<dyn PromotionRepository> =
        Arc::new(PromotionRepositoryImpl::new(db.clone()));
    let queue: Arc<dyn TaskQueue> = Arc::new(PostgresTaskQueue::new(Arc::new(
        TaskRepositoryImpl::new(db.clone()),
    )));

    // 6. Fetcher, extractor, discovery engine, vector store
    let robots = Arc::new(RobotsChecker::new(settings.fetcher.user_agent.clone()));
    let fetcher = Arc::new(Fetcher::new(&settings.fetcher, robots.clone()));
    let extractor: Arc<dyn Extractor> = Arc::new(HtmlExtractor::new());
    let discovery_engine = Arc::new(DiscoveryEngine::new(
        fetcher.clone(),
        robots.clone(),
        settings.discovery.clone(),
    ));
    let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

    // 7. Orchestrator
    let orchestrator = Arc::new(Orchestrator::new(
        waterfall.clone(),
        vector_store.clone(),
        document_repo.clone(),
        enrichment_repo.clone(),
        source_repo.clone(),
        task_repo.clone(),
        settings.orchestrator.clone(),
        settings.discovery.exclude_patterns.clone(),
        settings.discovery.default_depth_limit as i32,
    ));

    // 8. Scheduler (beat + evolution loop)
    let scheduler = Arc::new(EvolutionScheduler::new(
        source_repo.clone(),
        enrichment_repo.clone(),
        promotion_repo.clone(),
        task_repo.clone(),
        queue.clone(),
        settings.scheduler.clone(),
    ));
    let _scheduler_handle = scheduler.start();
    info!("Evolution scheduler started");

    // 9. Worker pools
    let mut manager = WorkerManager::new();

    {
        let task_repo = task_repo.clone();
        let source_repo = source_repo.clone();
        let document_repo = document_repo.clone();
        let discovery_engine = discovery_engine.clone();
        let max_docs = settings.discovery.max_documents_per_run;
        manager.start_pool(settings.workers.discovery_workers, move || {
            Arc::new(DiscoveryWorker::new(
                task_repo.clone(),
                source_repo.clone(),
                document_repo.clone(),
                discovery_engine.clone(),
                max_docs,
            )) as Arc<dyn Worker>
        });
    }
    {
        let task_repo = task_repo.clone();
        let document_repo = document_repo.clone();
        let fetcher = fetcher.clone();
        let extractor = extractor.clone();
        manager.start_pool(settings.workers.fetch_workers, move || {
            Arc::new(FetchWorker::new(
                task_repo.clone(),
                document_repo.clone(),
                fetcher.clone(),
                extractor.clone(),
            )) as Arc<dyn Worker>
        });
    }
    {
        let task_repo = task_repo.clone();
        let document_repo = document_repo.clone();
        let enrichment_repo = enrichment_repo.clone();
        let source_repo = source_repo.clone();
        let waterfall = waterfall.clone();
        let vector_store = vector_store.clone();
        let scheduler_settings = settings.scheduler.clone();
        manager.start_pool(settings.workers.enrich_workers, move || {
            Arc::new(EnrichWorker::new(
                task_repo.clone(),
                document_repo.clone(),
                enrichment_repo.clone(),
                source_repo.clone(),
                waterfall.clone(),
                vector_store.clone(),
                scheduler_settings.clone(),
            )) as Arc<dyn Worker>
        });
    }
    info!(
        "Worker pools started: {} discovery, {} fetch, {} enrich",
        settings.workers.discovery_workers,
        settings.workers.fetch_workers,
        settings.workers.enrich_workers
    );

    // 10. Operator API
    let state = AppState {
        sources: source_repo,
        tasks: task_repo,
        orchestrator,
        health,
        default_depth_limit: settings.discovery.default_depth_limit as i32,
        default_interval_secs: settings.scheduler.default_interval_secs,
    };
    let app = routes::build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Operator API listening on {}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = manager.wait_for_shutdown() => {}
    }

    Ok(())
}
