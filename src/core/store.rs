// author: kodeholic (powered by Claude)
// SessionStore — 연결 id → Session 라우팅 테이블
//
// 세션 간 공유되는 유일한 구조체. 락은 맵 조작 동안만 잡고,
// 엔진 호출/리포트 기록은 반드시 Arc<Session> 을 꺼낸 뒤 락 밖에서 수행한다.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

use super::session::Session;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        trace!("Initializing SessionStore");
        Self { sessions: RwLock::new(HashMap::new()) }
    }

    /// 등록 — 같은 id 가 있으면 이전 세션을 반환 (호출자가 정리 책임)
    pub fn put(&self, id: &str, session: Arc<Session>) -> Option<Arc<Session>> {
        let prev = self.sessions.write().unwrap().insert(id.to_string(), session);
        trace!("Session registered: {}", id);
        prev
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(id).cloned()
    }

    /// 제거 — 없는 id 면 조용히 None
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().unwrap().remove(id);
        if removed.is_some() {
            trace!("Session removed: {}", id);
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().unwrap().contains_key(id)
    }

    /// 현재 세션 수
    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// 전체 세션 스냅샷 (admin 조회용)
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().unwrap().values().cloned().collect()
    }
}
