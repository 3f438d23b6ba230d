// author: kodeholic (powered by Claude)
//
// HTTP REST API
//
// 운영
//   GET  /admin/status                   → 서버 상태 요약
//   GET  /admin/sessions                 → 세션 전체 목록
//   GET  /admin/sessions/{conn_id}       → 세션 상세
//   POST /admin/sessions/{conn_id}/stop  → 세션 강제 종료
//
// 관찰
//   GET  /trace                          → 전체 시그널링 이벤트 (SSE)
//   GET  /trace/{conn_id}                → 특정 연결만 (SSE)

mod admin;
mod dto;
mod state;
mod trace;

pub use admin::{admin_get_session, admin_list_sessions, admin_status, admin_stop_session};
pub use dto::{AdminSessionDetail, AdminSessionSummary, ServerStatus};
pub use state::HttpState;
pub use trace::trace_stream;
