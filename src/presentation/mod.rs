// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod handlers;
pub mod routes;

use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::orchestrator::Orchestrator;
use crate::providers::health::HealthRegistry;
use std::sync::Arc;

/// 操作员API的共享状态
#[derive(Clone)]
pub struct AppState {
    pub sources: Arc<dyn SourceRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub orchestrator: Arc<Orchestrator>,
    pub health: Arc<HealthRegistry>,
    pub default_depth_limit: i32,
    pub default_interval_secs: i64,
}
