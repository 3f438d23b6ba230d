// author: kodeholic (powered by Claude)
// HttpState — HTTP 핸들러 공유 상태

use std::sync::Arc;

use crate::controller::MediaSessionController;
use crate::core::SessionStore;
use crate::trace::TraceHub;
use crate::utils::current_timestamp;

#[derive(Clone)]
pub struct HttpState {
    pub store:         Arc<SessionStore>,
    pub controller:    Arc<MediaSessionController>,
    pub trace_hub:     Arc<TraceHub>,
    /// 연결된 미디어 엔진 주소 (status 표시용)
    pub engine_url:    String,
    /// 서버 프로세스 시작 시각 (Unix millis) — uptime 계산용
    pub start_time_ms: u64,
}

impl HttpState {
    pub fn new(
        controller: Arc<MediaSessionController>,
        trace_hub:  Arc<TraceHub>,
        engine_url: impl Into<String>,
    ) -> Self {
        Self {
            store: Arc::clone(controller.store()),
            controller,
            trace_hub,
            engine_url: engine_url.into(),
            start_time_ms: current_timestamp(),
        }
    }
}
