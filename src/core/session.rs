// author: kodeholic (powered by Claude)
// Session — 브라우저 WS 연결 1개에 대응하는 미디어 세션 레코드
//
// 불변 필드(연결 id, 엔진 핸들, 송신 큐)는 락 없이 읽고,
// 리포트 기록 + 송신 순서가 얽히는 가변 상태는 세션 단위 락(SessionInner)으로 직렬화한다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::warn;

use crate::diagnostics::DiagnosticsRecorder;
use crate::engine::{EndpointHandle, PipelineHandle};
use crate::protocol::message::{encode, ServerMessage, Status};
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::utils::current_timestamp;

/// 연결별 송신자 타입 (직렬화된 JSON 프레임)
pub type OutboundTx = mpsc::Sender<String>;

/// 원본 WS 연결 — id + 송신 큐
#[derive(Clone)]
pub struct Connection {
    pub id:    String,
    pub tx:    OutboundTx,
    pub trace: Arc<TraceHub>,
}

impl Connection {
    pub fn new(id: impl Into<String>, tx: OutboundTx, trace: Arc<TraceHub>) -> Self {
        Self { id: id.into(), tx, trace }
    }

    /// 송신 실패(연결 종료)는 로그만 남기고 삼킨다
    pub async fn send(&self, msg: &ServerMessage) -> bool {
        let json = encode(msg);
        self.trace.publish(TraceEvent::new(TraceDir::Out, Some(&self.id), msg.kind(), summarize(&json)));
        if self.tx.send(json).await.is_err() {
            warn!("[session] send skipped, connection closed: {}", self.id);
            return false;
        }
        true
    }
}

/// 트레이스 요약 — SDP 전문은 너무 길어서 앞부분만
pub fn summarize(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None           => text.to_string(),
    }
}

/// 세션 상태 — ABSENT 는 SessionStore 에 없음으로 표현
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Offer 처리 ~ ICE 수집 중
    Negotiating,
    /// ICE 수집 완료 또는 미디어 수신 관측
    Active,
    Closed,
}

pub struct SessionInner {
    pub phase:       SessionPhase,
    pub report:      DiagnosticsRecorder,
    /// 마지막으로 보낸 STATUS — 재전송 이벤트로 인한 중복 프레임 방지
    pub last_status: Option<Status>,
}

pub struct Session {
    pub conn:       Connection,
    pub report_id:  String,
    pub pipeline:   PipelineHandle,
    pub endpoint:   EndpointHandle,
    pub created_at: u64,
    inner:          Mutex<SessionInner>,
}

impl Session {
    pub fn new(
        conn:     Connection,
        pipeline: PipelineHandle,
        endpoint: EndpointHandle,
        report:   DiagnosticsRecorder,
    ) -> Self {
        Self {
            conn,
            report_id:  report.report_id().to_string(),
            pipeline,
            endpoint,
            created_at: current_timestamp(),
            inner: Mutex::new(SessionInner {
                phase: SessionPhase::Negotiating,
                report,
                last_status: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.conn.id
    }

    /// 세션 단위 락 — 리포트 기록과 송신을 직렬화
    pub async fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().await
    }
}

impl SessionInner {
    /// 종료 전이면 phase 갱신
    pub fn mark_active(&mut self) {
        if self.phase == SessionPhase::Negotiating {
            self.phase = SessionPhase::Active;
        }
    }

    /// 직전 STATUS 와 다를 때만 true (호출자가 송신)
    pub fn status_changed(&mut self, status: Status) -> bool {
        if self.last_status == Some(status) {
            return false;
        }
        self.last_status = Some(status);
        true
    }
}
