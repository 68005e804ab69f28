//! HTTP API endpoints for room inspection and administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::protocol::RoomSnapshot;
use crate::state::{directory, AppState};

/// GET /room/{code}
pub async fn get_room(Path(code): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let code = match directory::normalize_code(&code) {
        Ok(code) => code,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": e.code(), "msg": e.to_string() })),
            )
                .into_response();
        }
    };

    match state.find_room(&code).await {
        Some(handle) => {
            let room = handle.room.lock().await;
            Json(RoomSnapshot::of(&room)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": "ROOM_NOT_FOUND", "msg": format!("no room {code}") })),
        )
            .into_response(),
    }
}

/// DELETE /room/{code}
pub async fn delete_room(
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let code = match directory::normalize_code(&code) {
        Ok(code) => code,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": e.code(), "msg": e.to_string() })),
            )
                .into_response();
        }
    };

    if state.delete_room(&code).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": "ROOM_NOT_FOUND", "msg": format!("no room {code}") })),
        )
            .into_response()
    }
}
