// author: kodeholic (powered by Claude)
//
// MediaSessionController — 세션 생성/종료 + SDP/ICE 중계 + 엔진 이벤트 처리
//
// 상태 전이 (세션당):
//   ABSENT ──OFFER──▶ NEGOTIATING ──(IceGatheringDone | 미디어 수신)──▶ ACTIVE
//      ▲                   │                                              │
//      └──── CLOSED ◀──────┴── STOP / CLIENT_ERROR / 연결 종료 / 엔진 Error ┘
//
// 규칙:
//   - SessionStore 락을 잡은 채로 엔진을 호출하지 않는다 (Arc<Session> 꺼낸 뒤 호출)
//   - 리포트 기록과 송신은 세션 락 안에서 (프레임/리포트 라인 interleave 방지)
//   - 엔진 호출 중에는 세션 락을 잡지 않는다
//   - stop 은 store.remove 가 원자적이므로 정리는 정확히 1회

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::core::{Connection, Session, SessionInner, SessionPhase, SessionStore};
use crate::diagnostics::{validate_report_id, CandidateOrigin, DiagnosticsRecorder, PlaybackSide};
use crate::engine::{
    EngineEvent, FlowState, IceCandidate, IceComponentState, MediaEngine,
    MediaKind, PipelineHandle,
};
use crate::error::SignalResult;
use crate::protocol::message::{BrowserInfoPayload, ClientErrorPayload, OfferPayload, ServerMessage, Status};
use crate::trace::{TraceDir, TraceEvent};
use crate::utils::current_timestamp;

/// 세션 종료 사유 (로그/트레이스용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 브라우저 STOP
    Requested,
    /// 브라우저 CLIENT_ERROR
    ClientError,
    /// 엔진 Error 이벤트
    EngineError,
    /// Offer/Answer 협상 실패
    NegotiationFailed,
    /// WS 연결 종료
    Disconnected,
    /// 같은 연결에서 새 OFFER — 기존 세션 교체
    Replaced,
    /// 운영자 강제 종료
    Admin,
}

pub struct MediaSessionController {
    store:      Arc<SessionStore>,
    engine:     Arc<dyn MediaEngine>,
    report_dir: PathBuf,
}

impl MediaSessionController {
    pub fn new(store: Arc<SessionStore>, engine: Arc<dyn MediaEngine>, report_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self { store, engine, report_dir })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    // ------------------------------------------------------------------------
    // [OFFER] ABSENT → NEGOTIATING
    // ------------------------------------------------------------------------

    pub async fn handle_offer(self: &Arc<Self>, conn: &Connection, offer: OfferPayload) -> SignalResult<()> {
        if let Err(e) = validate_report_id(&offer.report_id) {
            conn.send(&ServerMessage::error(e.to_string())).await;
            return Err(e);
        }

        // 같은 연결의 기존 세션은 정리 후 교체
        if self.store.contains(&conn.id) {
            info!("[session] replace existing session conn={}", conn.id);
            self.stop(&conn.id, StopReason::Replaced).await;
        }

        info!("[session] new session conn={} report={} (sessions={})",
            conn.id, offer.report_id, self.store.count());

        let session = match self.allocate(conn, &offer).await {
            Ok(s)  => s,
            Err(e) => {
                error!("[session] allocation failed conn={}: {}", conn.id, e);
                conn.send(&ServerMessage::error(format!("[Kurento] {}", e))).await;
                return Err(e);
            }
        };

        if let Err(e) = self.negotiate(&session, &offer).await {
            error!("[session] negotiation failed conn={}: {}", conn.id, e);
            {
                // 엔진 Error 이벤트로 이미 닫혔으면 ERROR 는 이미 전송됨
                let inner = session.lock().await;
                if inner.phase != SessionPhase::Closed {
                    conn.send(&ServerMessage::error(format!("[Kurento] {}", e))).await;
                }
            }
            self.stop(&conn.id, StopReason::NegotiationFailed).await;
            return Err(e);
        }
        Ok(())
    }

    /// 리포트 + 파이프라인 + 엔드포인트 확보 후 세션 등록
    async fn allocate(&self, conn: &Connection, offer: &OfferPayload) -> SignalResult<Arc<Session>> {
        let mut report = DiagnosticsRecorder::open(&self.report_dir, &offer.report_id, current_timestamp()).await?;

        // 1. 파이프라인 + 엔드포인트 — 세션 등록 전 실패는 여기서 직접 정리
        let pipeline = match self.engine.create_pipeline().await {
            Ok(p)  => p,
            Err(e) => {
                report.close().await;
                return Err(e.into());
            }
        };
        let endpoint = match self.engine.create_endpoint(&pipeline).await {
            Ok(ep) => ep,
            Err(e) => {
                self.release_quietly(&pipeline).await;
                report.close().await;
                return Err(e.into());
            }
        };
        debug!("[session] pipeline={} endpoint={}", pipeline.id, endpoint.id);

        // 2. 세션 등록 — 이후 실패는 stop() 이 정리
        let session = Arc::new(Session::new(conn.clone(), pipeline, endpoint.clone(), report));
        if let Some(prev) = self.store.put(&conn.id, Arc::clone(&session)) {
            self.close_session(&prev, StopReason::Replaced).await;
        }
        conn.trace.publish(TraceEvent::new(TraceDir::Sys, Some(&conn.id), "SESSION_CREATED",
            format!("report={} endpoint={}", offer.report_id, endpoint.id)));
        Ok(session)
    }

    /// 구독 → loopback → Offer/Answer → candidate 수집
    async fn negotiate(self: &Arc<Self>, session: &Arc<Session>, offer: &OfferPayload) -> SignalResult<()> {
        let conn     = &session.conn;
        let endpoint = &session.endpoint;

        // 3. 이벤트 구독은 Offer 처리 전에
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.spawn_event_pump(conn.id.clone(), endpoint.id.clone(), event_rx);
        self.engine.subscribe(endpoint, event_tx).await?;

        // 4. loopback — 브라우저가 자기 미디어를 되돌려 받음
        self.engine.connect(endpoint, endpoint).await?;

        // 5. SDP 협상
        let sdp_answer = self.engine.process_offer(endpoint, &offer.sdp_offer).await?;
        debug!("[session] conn={} SDP Offer:\n{}", conn.id, offer.sdp_offer);
        debug!("[session] conn={} SDP Answer:\n{}", conn.id, sdp_answer);
        {
            let mut inner = session.lock().await;
            if inner.phase == SessionPhase::Closed {
                debug!("[session] skip SDP answer, session closed conn={}", conn.id);
                return Ok(());
            }
            conn.send(&ServerMessage::SdpAnswer { sdp_answer: sdp_answer.clone() }).await;
            inner.report.record_sdp(&offer.sdp_offer, &sdp_answer).await;
        }

        // 6. candidate 수집 시작 — 이 시점부터 엔드포인트가 실제로 동작
        self.engine.gather_candidates(endpoint).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // [ICE_CANDIDATE] 브라우저 → 엔진
    // ------------------------------------------------------------------------

    pub async fn handle_ice_candidate(&self, conn: &Connection, candidate: IceCandidate) -> SignalResult<()> {
        let Some(session) = self.store.get(&conn.id) else {
            warn!("[session] skip ICE candidate, unknown session conn={}", conn.id);
            return Ok(());
        };

        {
            let mut inner = session.lock().await;
            inner.report.record_candidate(CandidateOrigin::Remote, &candidate_json(&candidate)).await;
        }

        // candidate 전달 실패는 세션을 닫지 않는다
        if let Err(e) = self.engine.add_ice_candidate(&session.endpoint, &candidate).await {
            warn!("[session] addIceCandidate failed conn={}: {}", conn.id, e);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // [STOP / CLIENT_ERROR] any → CLOSED
    // ------------------------------------------------------------------------

    pub async fn handle_client_error(&self, conn: &Connection, payload: ClientErrorPayload) -> SignalResult<()> {
        error!("[session] browser error conn={}: {}", conn.id, payload.message);
        // 브라우저 에러 후에는 상대가 멈춘 것으로 간주
        self.stop(&conn.id, StopReason::ClientError).await;
        Ok(())
    }

    /// 세션 종료 — 없으면 no-op. 실제로 정리했으면 true
    pub async fn stop(&self, conn_id: &str, reason: StopReason) -> bool {
        let Some(session) = self.store.remove(conn_id) else {
            trace!("[session] stop skipped, no session conn={} reason={:?}", conn_id, reason);
            return false;
        };
        self.close_session(&session, reason).await;
        true
    }

    async fn close_session(&self, session: &Session, reason: StopReason) {
        info!("[session] stop conn={} report={} reason={:?}", session.id(), session.report_id, reason);

        self.release_quietly(&session.pipeline).await;

        let mut inner = session.lock().await;
        inner.phase = SessionPhase::Closed;
        inner.report.close().await;
        drop(inner);

        session.conn.trace.publish(TraceEvent::new(TraceDir::Sys, Some(session.id()), "SESSION_CLOSED",
            format!("reason={:?}", reason)));
    }

    async fn release_quietly(&self, pipeline: &PipelineHandle) {
        if let Err(e) = self.engine.release_pipeline(pipeline).await {
            warn!("[session] release pipeline={} failed: {}", pipeline.id, e);
        }
    }

    // ------------------------------------------------------------------------
    // [REPORT_*] 진단 리포트 — 세션이 없으면 기록하지 않음
    // ------------------------------------------------------------------------

    pub async fn report_start(&self, conn: &Connection) -> SignalResult<()> {
        info!("[report] start conn={}", conn.id);
        if let Some(session) = self.store.get(&conn.id) {
            session.lock().await.report.record_start(current_timestamp()).await;
        }
        Ok(())
    }

    pub async fn report_browser_info(&self, conn: &Connection, payload: BrowserInfoPayload) -> SignalResult<()> {
        info!("[report] browser info conn={}", conn.id);
        if let Some(session) = self.store.get(&conn.id) {
            session.lock().await.report.record_browser_info(&payload.browser_info).await;
        }
        Ok(())
    }

    pub async fn report_playing(&self, conn: &Connection, side: PlaybackSide) -> SignalResult<()> {
        self.report_playing_at(conn, side, current_timestamp()).await;
        Ok(())
    }

    /// 재생 시작 기록 — 경과 시간(ms) 반환, 세션 없으면 None
    pub async fn report_playing_at(&self, conn: &Connection, side: PlaybackSide, now_ms: u64) -> Option<u64> {
        let session = self.store.get(&conn.id)?;
        let elapsed = session.lock().await.report.record_playing(side, now_ms).await;
        info!("[report] {:?} playing conn={} delay_ms={:?}", side, conn.id, elapsed);
        elapsed
    }

    // ------------------------------------------------------------------------
    // [엔진 이벤트] 세션당 단일 디스패치
    // ------------------------------------------------------------------------

    fn spawn_event_pump(self: &Arc<Self>, conn_id: String, endpoint_id: String, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !controller.on_engine_event(&conn_id, &endpoint_id, event).await {
                    break;
                }
            }
            trace!("[session] event pump finished conn={}", conn_id);
        });
    }

    /// 엔진 이벤트 1건 처리 — 세션이 더 이상 유효하지 않으면 false (펌프 종료)
    pub async fn on_engine_event(&self, conn_id: &str, endpoint_id: &str, event: EngineEvent) -> bool {
        self.on_engine_event_at(conn_id, endpoint_id, event, current_timestamp()).await
    }

    pub async fn on_engine_event_at(&self, conn_id: &str, endpoint_id: &str, event: EngineEvent, now_ms: u64) -> bool {
        let Some(session) = self.store.get(conn_id) else {
            debug!("[session] drop {} event, session gone conn={}", event.name(), conn_id);
            return false;
        };
        // 교체된 이전 세션의 잔여 이벤트
        if session.endpoint.id != endpoint_id {
            debug!("[session] drop stale {} event conn={} endpoint={}", event.name(), conn_id, endpoint_id);
            return false;
        }

        session.conn.trace.publish(TraceEvent::new(TraceDir::Sys, Some(conn_id), event.name(), format!("{:?}", event)));

        if let EngineEvent::Error { description, code } = &event {
            error!("[WebRtcEndpoint::Error] conn={} code={} description={}", conn_id, code, description);
            {
                let mut inner = session.lock().await;
                if inner.phase == SessionPhase::Closed {
                    return false;
                }
                inner.phase = SessionPhase::Closed;
                session.conn.send(&ServerMessage::error(format!("[Kurento] {}", description))).await;
            }
            self.stop(conn_id, StopReason::EngineError).await;
            return false;
        }

        let mut inner = session.lock().await;
        if inner.phase == SessionPhase::Closed {
            return false;
        }
        apply_event(&session, &mut inner, event, now_ms).await;
        true
    }
}

/// Error 를 제외한 엔진 이벤트 반영 (세션 락 보유 상태)
async fn apply_event(session: &Session, inner: &mut SessionInner, event: EngineEvent, now_ms: u64) {
    let conn_id = session.id();
    match event {
        EngineEvent::MediaFlowIn { state, media, pad_name } => {
            info!("[WebRtcEndpoint::MediaFlowInStateChange] conn={} state={:?} media={:?} pad={}",
                conn_id, state, media, pad_name);
            if media == MediaKind::Video && state == FlowState::Flowing {
                inner.report.record_media_flow(now_ms).await;
                inner.mark_active();
                send_status(session, inner, Status::MediaFlowing).await;
            }
        }
        EngineEvent::MediaFlowOut { state, media, pad_name } => {
            info!("[WebRtcEndpoint::MediaFlowOutStateChange] conn={} state={:?} media={:?} pad={}",
                conn_id, state, media, pad_name);
        }
        EngineEvent::ConnectionStateChanged { old_state, new_state } => {
            info!("[WebRtcEndpoint::ConnectionStateChanged] conn={} {} -> {}", conn_id, old_state, new_state);
        }
        EngineEvent::MediaStateChanged { old_state, new_state } => {
            info!("[WebRtcEndpoint::MediaStateChanged] conn={} {} -> {}", conn_id, old_state, new_state);
        }
        EngineEvent::MediaTranscodingStateChange { state, bin_name, media } => {
            info!("[WebRtcEndpoint::MediaTranscodingStateChange] conn={} state={} bin={} media={:?}",
                conn_id, state, bin_name, media);
        }
        EngineEvent::IceComponentStateChange { stream_id, component_id, state } => {
            debug!("[WebRtcEndpoint::IceComponentStateChange] conn={} stream={} component={} state={:?}",
                conn_id, stream_id, component_id, state);
            match state {
                IceComponentState::Gathering  => inner.report.record_ice_start(now_ms).await,
                IceComponentState::Connecting => send_status(session, inner, Status::IceConnecting).await,
                _ => {}
            }
        }
        EngineEvent::IceCandidateFound(candidate) => {
            debug!("[WebRtcEndpoint::IceCandidateFound] conn={} candidate={}", conn_id, candidate.candidate);
            inner.report.record_candidate(CandidateOrigin::Local, &candidate_json(&candidate)).await;
            session.conn.send(&ServerMessage::IceCandidate(candidate)).await;
        }
        EngineEvent::IceGatheringDone => {
            let elapsed = inner.report.record_ice_done(now_ms).await;
            inner.mark_active();
            info!("[WebRtcEndpoint::IceGatheringDone] conn={} elapsed_ms={:?}", conn_id, elapsed);
        }
        EngineEvent::NewCandidatePairSelected { stream_id, local, remote } => {
            info!("[WebRtcEndpoint::NewCandidatePairSelected] conn={} stream={} local={} remote={}",
                conn_id, stream_id, local, remote);
        }
        EngineEvent::Error { .. } => {}
    }
}

async fn send_status(session: &Session, inner: &mut SessionInner, status: Status) {
    if inner.status_changed(status) {
        session.conn.send(&ServerMessage::Status { status }).await;
    }
}

fn candidate_json(candidate: &IceCandidate) -> String {
    serde_json::to_string(candidate).unwrap_or_default()
}
