// author: kodeholic (powered by Claude)
// HTTP 응답 DTO — ksadmin 이 그대로 역직렬화

use serde::{Deserialize, Serialize};

use crate::core::SessionPhase;

/// GET /admin/status
#[derive(Serialize, Deserialize, Debug)]
pub struct ServerStatus {
    pub uptime_secs:   u64,
    pub session_count: usize,
    pub engine_url:    String,
}

/// GET /admin/sessions 아이템
#[derive(Serialize, Deserialize, Debug)]
pub struct AdminSessionSummary {
    pub conn_id:   String,
    pub report_id: String,
    pub phase:     SessionPhase,
    pub age_secs:  u64,
}

/// GET /admin/sessions/{conn_id}
#[derive(Serialize, Deserialize, Debug)]
pub struct AdminSessionDetail {
    pub conn_id:       String,
    pub report_id:     String,
    pub phase:         SessionPhase,
    pub pipeline_id:   String,
    pub endpoint_id:   String,
    pub created_at:    u64,   // Unix millis
    pub age_secs:      u64,
    pub report_path:   String,
    pub ice_start_ms:  Option<u64>,
    pub media_flow_ms: Option<u64>,
}
