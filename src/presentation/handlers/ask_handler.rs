// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::ask_request::AskRequestDto;
use crate::presentation::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use validator::Validate;

/// 处理提问请求
///
/// 编排器总是返回一个回答；上下文不足时答案带low_confidence
/// 标记，而不是向调用方抛错
pub async fn ask(
    State(state): State<AppState>,
    Json(payload): Json<AskRequestDto>,
) -> impl IntoResponse {
    if let Err(e) = payload.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
            .into_response();
    }

    let report = state.orchestrator.answer(&payload.question).await;
    (StatusCode::OK, Json(report)).into_response()
}
