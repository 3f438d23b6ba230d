// author: kodeholic (powered by Gemini)
// 네트워크 로직과 철저히 분리된, 순수 세션 상태 관리 모듈입니다.

pub mod session;
pub mod store;

pub use session::{Connection, OutboundTx, Session, SessionInner, SessionPhase};
pub use store::SessionStore;
