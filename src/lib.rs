// author: kodeholic (powered by Claude)

pub mod config;
pub mod controller;
pub mod core;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod http;
pub mod protocol;
pub mod trace;
pub mod utils;

use axum::{routing::{get, post}, Router};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::controller::MediaSessionController;
use crate::core::SessionStore;
use crate::engine::{KurentoClient, MediaEngine};
use crate::http::HttpState;
use crate::protocol::{ws_handler, AppState};
use crate::trace::TraceHub;

/// CLI에서 주입되는 런타임 설정
/// - 기본값은 config.rs 상수
pub struct ServerArgs {
    pub port:            u16,
    pub kms_url:         String,
    pub report_dir:      PathBuf,
    pub call_timeout_ms: u64,
}

/// 라우터 조립 — 엔진 구현과 무관 (테스트에서는 가짜 엔진 주입)
pub fn build_router(engine: Arc<dyn MediaEngine>, report_dir: PathBuf, engine_url: &str) -> Router {
    let store      = Arc::new(SessionStore::new());
    let controller = MediaSessionController::new(Arc::clone(&store), engine, report_dir);
    let trace_hub  = TraceHub::new();

    let app_state = AppState {
        store:      Arc::clone(&store),
        controller: Arc::clone(&controller),
        trace_hub:  Arc::clone(&trace_hub),
    };

    let http_state = HttpState::new(Arc::clone(&controller), Arc::clone(&trace_hub), engine_url);

    let admin_router = Router::new()
        .route("/admin/status",                  get(http::admin_status))
        .route("/admin/sessions",                get(http::admin_list_sessions))
        .route("/admin/sessions/{conn_id}",      get(http::admin_get_session))
        .route("/admin/sessions/{conn_id}/stop", post(http::admin_stop_session))
        .route("/trace",           get(http::trace_stream))
        .route("/trace/{conn_id}", get(http::trace_stream))
        .with_state(http_state);

    // CORS — 테스트 페이지/관리 도구 로컬 접속용 전체 허용
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(app_state)
        .merge(admin_router)
        .layer(cors)
}

pub async fn run_server(args: ServerArgs) {
    if let Err(e) = tokio::fs::create_dir_all(&args.report_dir).await {
        error!("[report] cannot create report dir {}: {}", args.report_dir.display(), e);
        return;
    }

    let timeout = Duration::from_millis(args.call_timeout_ms);
    let engine = match KurentoClient::connect(&args.kms_url, timeout).await {
        Ok(client) => client,
        Err(e) => {
            error!("[kms] cannot connect to {}: {}", args.kms_url, e);
            return;
        }
    };
    info!("[kms] connected to {}", engine.url());

    let app = build_router(engine, args.report_dir.clone(), &args.kms_url);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l)  => l,
        Err(e) => {
            error!("[mini-kurento-signal] bind {} failed: {}", addr, e);
            return;
        }
    };

    info!("[mini-kurento-signal] Signaling Server on ws://{}/ws", addr);
    info!("[mini-kurento-signal] Reports in {}", args.report_dir.display());

    if let Err(e) = axum::serve(listener, app).await {
        error!("[mini-kurento-signal] server error: {}", e);
    }
}
