// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::source_request::{CreateSourceDto, SourceView, TriggerDiscoveryDto};
use crate::domain::models::source::{DiscoveryMode, Source, SourceStatus};
use crate::domain::models::task::Task;
use crate::presentation::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// 创建来源
///
/// 人工添加的来源直接进入active状态并获得调度间隔
pub async fn create_source(
    State(state): State<AppState>,
    Json(payload): Json<CreateSourceDto>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
            .into_response();
    }

    let mode = payload
        .discovery_mode
        .as_deref()
        .map(|s| s.parse::<DiscoveryMode>())
        .unwrap_or(Ok(DiscoveryMode::Auto));
    let Ok(mode) = mode else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "discovery_mode must be sitemap, recursive or auto" })),
        )
            .into_response();
    };

    match state.sources.find_by_root_url(&payload.root_url).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "error": "source already exists" })),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }

    let source = Source::new_manual(
        payload.root_url,
        mode,
        payload
            .crawl_depth_limit
            .unwrap_or(state.default_depth_limit),
        payload
            .schedule_interval_secs
            .unwrap_or(state.default_interval_secs),
    );

    match state.sources.create(&source).await {
        Ok(created) => {
            (StatusCode::CREATED, Json(SourceView::from(created))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// 状态过滤参数
#[derive(Debug, Deserialize)]
pub struct ListSourcesQuery {
    pub status: Option<String>,
}

/// 列出来源（只读视图）
pub async fn list_sources(
    State(state): State<AppState>,
    Query(query): Query<ListSourcesQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref() {
        Some(raw) => match raw.parse::<SourceStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "unknown status filter" })),
                )
                    .into_response()
            }
        },
        None => None,
    };

    match state.sources.list(status).await {
        Ok(sources) => {
            let views: Vec<SourceView> = sources.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// 手动触发一次发现运行
///
/// force_mode只作用于本次运行，不修改来源本身的模式
pub async fn trigger_discovery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TriggerDiscoveryDto>>,
) -> impl IntoResponse {
    let source = match state.sources.find_by_id(id).await {
        Ok(Some(source)) => source,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "source not found" })),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    };

    let force_mode = payload.and_then(|Json(p)| p.force_mode);
    if let Some(raw) = &force_mode {
        if raw.parse::<DiscoveryMode>().is_err() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "force_mode must be sitemap, recursive or auto" })),
            )
                .into_response();
        }
    }

    let mut task = Task::discovery(source.id, source.root_url.clone(), json!({}));
    if let Some(mode) = force_mode {
        task.payload = json!({ "force_mode": mode });
    }

    match state.tasks.create(&task).await {
        Ok(created) => (
            StatusCode::ACCEPTED,
            Json(json!({ "task_id": created.id, "source_id": source.id })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// 暂停来源
pub async fn pause_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    transition_source(state, id, |source| source.pause()).await
}

/// 退役来源（归档，不删除）
pub async fn retire_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    transition_source(state, id, |source| source.retire()).await
}

async fn transition_source<F>(state: AppState, id: Uuid, transition: F) -> axum::response::Response
where
    F: FnOnce(Source) -> Result<Source, crate::domain::models::DomainError>,
{
    let source = match state.sources.find_by_id(id).await {
        Ok(Some(source)) => source,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "source not found" })),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    };

    match transition(source) {
        Ok(updated) => match state.sources.update(&updated).await {
            Ok(saved) => (StatusCode::OK, Json(SourceView::from(saved))).into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        },
        Err(e) => (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}
