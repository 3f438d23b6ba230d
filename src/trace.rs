// author: kodeholic (powered by Claude)
//
// TraceHub — 시그널링 이벤트 실시간 관찰 버스
//
// 구조:
//   라우터(수신), Connection::send(송신), 컨트롤러(세션 생명주기)
//       └── TraceHub::publish(event)
//               └── broadcast::Sender  (구독자 수에 무관하게 O(1) publish)
//                       ├── SSE subscriber (kstrace 프로세스 1)
//                       └── SSE subscriber (kstrace 프로세스 2)
//
// 구독자가 없을 때 publish는 그냥 drop (서버 성능에 무영향)
// 구독자가 느리면 lagged 에러 반환 — 구독자 쪽에서 처리

use std::sync::Arc;
use tokio::sync::broadcast;
use serde::Serialize;
use crate::utils::current_timestamp;

/// 브로드캐스트 채널 버퍼 크기
/// 구독자가 느릴 때 최대 보유 이벤트 수 — 초과 시 오래된 이벤트 drop
const TRACE_BUF: usize = 512;

/// 이벤트 방향
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TraceDir {
    /// 브라우저 → 서버
    In,
    /// 서버 → 브라우저
    Out,
    /// 서버 내부 (세션 생명주기, 엔진 이벤트)
    Sys,
}

/// 하나의 시그널링 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Unix millis
    pub ts:      u64,
    pub dir:     TraceDir,
    /// 연결 id (없으면 None)
    pub conn_id: Option<String>,
    /// 메시지 kind 또는 엔진 이벤트 이름
    pub kind:    String,
    /// 이벤트 요약 메시지
    pub summary: String,
}

impl TraceEvent {
    pub fn new(
        dir:     TraceDir,
        conn_id: Option<&str>,
        kind:    &str,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            ts:      current_timestamp(),
            dir,
            conn_id: conn_id.map(str::to_string),
            kind:    kind.to_string(),
            summary: summary.into(),
        }
    }
}

pub struct TraceHub {
    tx: broadcast::Sender<TraceEvent>,
}

impl TraceHub {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(TRACE_BUF);
        Arc::new(Self { tx })
    }

    /// 이벤트 publish — 구독자가 없으면 조용히 무시
    pub fn publish(&self, event: TraceEvent) {
        let _ = self.tx.send(event);
    }

    /// SSE 구독자 생성 — 각 HTTP 연결마다 호출
    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }
}
