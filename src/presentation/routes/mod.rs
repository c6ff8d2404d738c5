// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::{ask_handler, source_handler, status_handler};
use crate::presentation::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// 构建操作员API路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/sources",
            post(source_handler::create_source).get(source_handler::list_sources),
        )
        .route(
            "/v1/sources/{id}/discover",
            post(source_handler::trigger_discovery),
        )
        .route("/v1/sources/{id}/pause", post(source_handler::pause_source))
        .route("/v1/sources/{id}/retire", post(source_handler::retire_source))
        .route("/v1/ask", post(ask_handler::ask))
        .route("/v1/status", get(status_handler::status))
        .route(
            "/v1/providers/{name}/reset",
            post(status_handler::reset_provider),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
