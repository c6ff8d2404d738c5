// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{TaskStatus, TaskType};
use crate::presentation::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

/// 队列深度与提供商健康的只读视图
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let mut queues = serde_json::Map::new();
    for task_type in [TaskType::Discovery, TaskType::Fetch, TaskType::Enrich] {
        let mut by_status = serde_json::Map::new();
        for task_status in [TaskStatus::Queued, TaskStatus::Active, TaskStatus::Failed] {
            match state.tasks.count_by_status(task_type, task_status).await {
                Ok(count) => {
                    by_status.insert(task_status.to_string(), json!(count));
                }
                Err(e) => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": e.to_string() })),
                    )
                        .into_response()
                }
            }
        }
        queues.insert(task_type.to_string(), json!(by_status));
    }

    let providers = state.health.snapshot();

    (
        StatusCode::OK,
        Json(json!({
            "queues": queues,
            "providers": providers,
        })),
    )
        .into_response()
}

/// 操作员重置提供商健康状态
///
/// unavailable状态的唯一恢复路径
pub async fn reset_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    state.health.reset(&name);
    (StatusCode::OK, Json(json!({ "provider": name, "state": "healthy" }))).into_response()
}
