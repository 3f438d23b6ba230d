// author: kodeholic (powered by Claude)

use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, trace, warn};

use crate::config;
use crate::controller::{MediaSessionController, StopReason};
use crate::core::{session::summarize, Connection, SessionStore};
use crate::diagnostics::PlaybackSide;
use crate::protocol::message::{parse_client_message, ClientMessage, ServerMessage};
use crate::trace::{TraceDir, TraceEvent, TraceHub};

// ----------------------------------------------------------------------------
// [공유 상태]
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store:      Arc<SessionStore>,
    pub controller: Arc<MediaSessionController>,
    pub trace_hub:  Arc<TraceHub>,
}

/// 연결 id 발급기 (프로세스 내 유일)
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

fn next_conn_id() -> String {
    format!("conn_{}", NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
}

// ----------------------------------------------------------------------------
// [WS 진입점]
// ----------------------------------------------------------------------------

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

// ----------------------------------------------------------------------------
// [핵심] 개별 브라우저 WS 생명주기
// ----------------------------------------------------------------------------

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (egress_tx, mut egress_rx) = mpsc::channel::<String>(config::EGRESS_QUEUE_SIZE);

    let conn = Connection::new(next_conn_id(), egress_tx, Arc::clone(&state.trace_hub));
    trace!("[router] connected {}", conn.id);
    state.trace_hub.publish(TraceEvent::new(TraceDir::Sys, Some(&conn.id), "CONNECTED", ""));

    // [rx_loop] egress 큐 → WS 송신
    let rx_loop = tokio::spawn(async move {
        while let Some(json) = egress_rx.recv().await {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // [tx_loop] WS 수신 → dispatch (연결당 순차 처리)
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t))  => t,
            Ok(Message::Close(_)) => break,
            Err(e) => { warn!("[router] error {}: {}", conn.id, e); break; }
            _ => continue,
        };
        dispatch(&state, &conn, &text).await;
    }

    // 연결 종료 = STOP 과 동일
    state.controller.stop(&conn.id, StopReason::Disconnected).await;
    state.trace_hub.publish(TraceEvent::new(TraceDir::Sys, Some(&conn.id), "DISCONNECTED", ""));
    trace!("[router] disconnected {}", conn.id);
    rx_loop.abort();
}

/// 수신 메시지 1건 처리
/// - 형식 오류: ERROR 응답 후 계속
/// - 모르는 kind: 경고 로그만
pub async fn dispatch(state: &AppState, conn: &Connection, text: &str) {
    let message = match parse_client_message(text) {
        Ok(m)  => m,
        Err(e) => {
            warn!("[router] malformed message {}: {}", conn.id, e);
            conn.send(&ServerMessage::error(e.to_string())).await;
            return;
        }
    };

    trace!("[router] {} <- {}", conn.id, message.kind());
    state.trace_hub.publish(TraceEvent::new(TraceDir::In, Some(&conn.id), message.kind(), summarize(text)));

    let controller = &state.controller;
    let result = match message {
        ClientMessage::Offer(p)             => controller.handle_offer(conn, p).await,
        ClientMessage::IceCandidate(c)      => controller.handle_ice_candidate(conn, c).await,
        ClientMessage::Stop                 => { controller.stop(&conn.id, StopReason::Requested).await; Ok(()) }
        ClientMessage::ClientError(p)       => controller.handle_client_error(conn, p).await,
        ClientMessage::ReportStart          => controller.report_start(conn).await,
        ClientMessage::ReportBrowserInfo(p) => controller.report_browser_info(conn, p).await,
        ClientMessage::ReportLocalPlaying   => controller.report_playing(conn, PlaybackSide::Local).await,
        ClientMessage::ReportRemotePlaying  => controller.report_playing(conn, PlaybackSide::Remote).await,
        ClientMessage::Unknown(kind) => {
            warn!("[router] unknown kind from {}: {}", conn.id, kind);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("[router] handler error {}: {}", conn.id, e);
    }
}
