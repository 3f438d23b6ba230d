// author: kodeholic (powered by Claude)
// Admin REST API 핸들러

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::controller::StopReason;
use crate::utils::current_timestamp;

use super::dto::*;
use super::state::HttpState;

fn not_found(conn_id: &str) -> axum::response::Response {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({
        "error": format!("Session not found: {}", conn_id)
    }))).into_response()
}

/// GET /admin/status
pub async fn admin_status(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime_secs = current_timestamp().saturating_sub(state.start_time_ms) / 1000;
    Json(ServerStatus {
        uptime_secs,
        session_count: state.store.count(),
        engine_url:    state.engine_url.clone(),
    })
}

/// GET /admin/sessions
pub async fn admin_list_sessions(State(state): State<HttpState>) -> impl IntoResponse {
    let now = current_timestamp();
    let mut list = Vec::new();
    for session in state.store.all_sessions() {
        let phase = session.lock().await.phase;
        list.push(AdminSessionSummary {
            conn_id:   session.id().to_string(),
            report_id: session.report_id.clone(),
            phase,
            age_secs:  now.saturating_sub(session.created_at) / 1000,
        });
    }
    list.sort_by(|a, b| a.conn_id.cmp(&b.conn_id));
    Json(list)
}

/// GET /admin/sessions/{conn_id}
pub async fn admin_get_session(
    State(state): State<HttpState>,
    Path(conn_id): Path<String>,
) -> impl IntoResponse {
    let Some(session) = state.store.get(&conn_id) else {
        return not_found(&conn_id);
    };

    let inner = session.lock().await;
    Json(AdminSessionDetail {
        conn_id:       session.id().to_string(),
        report_id:     session.report_id.clone(),
        phase:         inner.phase,
        pipeline_id:   session.pipeline.id.clone(),
        endpoint_id:   session.endpoint.id.clone(),
        created_at:    session.created_at,
        age_secs:      current_timestamp().saturating_sub(session.created_at) / 1000,
        report_path:   inner.report.path().display().to_string(),
        ice_start_ms:  inner.report.ice_start_ms(),
        media_flow_ms: inner.report.media_flow_ms(),
    }).into_response()
}

/// POST /admin/sessions/{conn_id}/stop
pub async fn admin_stop_session(
    State(state): State<HttpState>,
    Path(conn_id): Path<String>,
) -> impl IntoResponse {
    if !state.controller.stop(&conn_id, StopReason::Admin).await {
        return not_found(&conn_id);
    }
    info!("[admin] session stopped: {}", conn_id);
    Json(serde_json::json!({ "conn_id": conn_id, "stopped": true })).into_response()
}
