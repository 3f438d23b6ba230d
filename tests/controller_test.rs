// author: kodeholic (powered by Claude)

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use mini_kurento_signal::controller::StopReason;
use mini_kurento_signal::core::SessionPhase;
use mini_kurento_signal::diagnostics::{report_path, PlaybackSide};
use mini_kurento_signal::engine::{
    EngineEvent, FlowState, IceCandidate, IceComponentState, MediaKind,
};
use mini_kurento_signal::protocol::message::{BrowserInfoPayload, ClientErrorPayload, OfferPayload};

fn offer(report_id: &str, sdp: &str) -> OfferPayload {
    OfferPayload { report_id: report_id.to_string(), sdp_offer: sdp.to_string() }
}

fn candidate(text: &str) -> IceCandidate {
    IceCandidate { candidate: text.to_string(), sdp_mid: "0".to_string(), sdp_m_line_index: 0 }
}

fn video_flowing() -> EngineEvent {
    EngineEvent::MediaFlowIn { state: FlowState::Flowing, media: MediaKind::Video, pad_name: "default".into() }
}

fn read_report(dir: &tempfile::TempDir, report_id: &str) -> String {
    std::fs::read_to_string(report_path(dir.path(), report_id)).unwrap()
}

// ----------------------------------------------------------------------------
// [OFFER]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_offer_creates_session_and_answers() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();

    assert!(ctrl.store().contains("c1"), "세션이 등록되어야 합니다.");

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["SDP_ANSWER"]);
    assert_eq!(frames[0]["sdpAnswer"], FAKE_ANSWER);

    let session = ctrl.store().get("c1").unwrap();
    let ep      = session.endpoint.id.clone();
    assert_eq!(engine.calls(), vec![
        Call::CreatePipeline,
        Call::CreateEndpoint(session.pipeline.id.clone()),
        Call::Subscribe(ep.clone()),
        Call::Connect(ep.clone(), ep.clone()),
        Call::ProcessOffer(ep.clone(), "O".to_string()),
        Call::GatherCandidates(ep),
    ]);

    let report = read_report(&dir, "r1");
    assert!(report.contains("ReportId: r1"));
    assert!(report.contains("SdpOffer: O"));
    assert!(report.contains(&format!("SdpAnswer: {}", FAKE_ANSWER)));
}

#[tokio::test]
async fn test_offer_with_invalid_report_id_is_rejected() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    assert!(ctrl.handle_offer(&conn, offer("../evil", "O")).await.is_err());

    assert_eq!(kinds(&drain(&mut rx)), vec!["ERROR"]);
    assert!(!ctrl.store().contains("c1"));
    assert!(engine.calls().is_empty(), "엔진 호출이 없어야 합니다.");
}

#[tokio::test]
async fn test_negotiation_failure_sends_error_and_closes() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    engine.fail_offer.store(true, Ordering::Relaxed);
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    assert!(ctrl.handle_offer(&conn, offer("r1", "bad sdp")).await.is_err());

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["ERROR"]);
    assert!(frames[0]["message"].as_str().unwrap().starts_with("[Kurento]"));
    assert!(!ctrl.store().contains("c1"));
    assert_eq!(engine.releases(), 1);
}

#[tokio::test]
async fn test_second_offer_replaces_session() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O1")).await.unwrap();
    let first = ctrl.store().get("c1").unwrap();

    ctrl.handle_offer(&conn, offer("r2", "O2")).await.unwrap();
    let second = ctrl.store().get("c1").unwrap();

    assert_eq!(second.report_id, "r2");
    assert_eq!(ctrl.store().count(), 1);
    assert_eq!(engine.calls().iter().filter(|c| **c == Call::ReleasePipeline(first.pipeline.id.clone())).count(), 1);
    assert_eq!(first.lock().await.phase, SessionPhase::Closed);
    assert!(!first.lock().await.report.is_open());

    // 교체된 세션의 잔여 이벤트는 무시
    assert!(!ctrl.on_engine_event("c1", &first.endpoint.id, EngineEvent::IceGatheringDone).await);
}

// ----------------------------------------------------------------------------
// [STOP]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    let session = ctrl.store().get("c1").unwrap();

    assert!(ctrl.stop("c1", StopReason::Requested).await);
    assert!(!ctrl.stop("c1", StopReason::Requested).await);
    assert!(!ctrl.stop("c1", StopReason::Disconnected).await);

    assert_eq!(engine.releases(), 1, "파이프라인은 정확히 1회 해제되어야 합니다.");
    assert!(!ctrl.store().contains("c1"));

    let mut inner = session.lock().await;
    assert_eq!(inner.phase, SessionPhase::Closed);
    assert!(!inner.report.is_open());
    assert!(!inner.report.close().await, "싱크는 이미 닫혀 있어야 합니다.");
}

#[tokio::test]
async fn test_stop_without_session_is_noop() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());

    assert!(!ctrl.stop("ghost", StopReason::Requested).await);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_client_error_closes_session() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    ctrl.handle_client_error(&conn, ClientErrorPayload { message: "getUserMedia failed".into() }).await.unwrap();

    assert!(!ctrl.store().contains("c1"));
    assert_eq!(engine.releases(), 1);
}

// ----------------------------------------------------------------------------
// [ICE_CANDIDATE]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_candidate_for_absent_session_is_dropped() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_ice_candidate(&conn, candidate("candidate:1")).await.unwrap();

    assert!(engine.calls().is_empty(), "엔진 호출이 없어야 합니다.");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_candidate_forwarded_and_recorded() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    ctrl.handle_ice_candidate(&conn, candidate("candidate:remote")).await.unwrap();

    assert_eq!(engine.count(|c| matches!(c, Call::AddIceCandidate(_, cand) if cand == "candidate:remote")), 1);
    assert!(read_report(&dir, "r1").contains("RemoteCandidate: {\"candidate\":\"candidate:remote\""));
}

#[tokio::test]
async fn test_candidate_failure_is_not_fatal() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    engine.fail_candidate.store(true, Ordering::Relaxed);
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    assert!(ctrl.handle_ice_candidate(&conn, candidate("candidate:1")).await.is_ok());
    assert!(ctrl.store().contains("c1"));
    assert_eq!(engine.releases(), 0);
}

// ----------------------------------------------------------------------------
// [엔진 이벤트]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_media_flow_first_write_wins_and_status_once() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    drain(&mut rx);
    let session = ctrl.store().get("c1").unwrap();
    let ep      = session.endpoint.id.clone();

    assert!(ctrl.on_engine_event_at("c1", &ep, video_flowing(), 50).await);
    assert!(ctrl.on_engine_event_at("c1", &ep, video_flowing(), 80).await);

    {
        let inner = session.lock().await;
        assert_eq!(inner.report.media_flow_ms(), Some(50));
        assert_eq!(inner.phase, SessionPhase::Active);
    }

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["STATUS"], "재전송 이벤트로 STATUS 가 중복되면 안 됩니다.");
    assert_eq!(frames[0]["status"], "MEDIA_FLOWING");
}

#[tokio::test]
async fn test_audio_flow_does_not_mark_media_flow() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    drain(&mut rx);
    let session = ctrl.store().get("c1").unwrap();

    let audio = EngineEvent::MediaFlowIn { state: FlowState::Flowing, media: MediaKind::Audio, pad_name: "default".into() };
    ctrl.on_engine_event_at("c1", &session.endpoint.id, audio, 10).await;

    assert_eq!(session.lock().await.report.media_flow_ms(), None);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_remote_playing_delay_since_media_flow() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    let ep = ctrl.store().get("c1").unwrap().endpoint.id.clone();

    ctrl.on_engine_event_at("c1", &ep, video_flowing(), 50).await;

    assert_eq!(ctrl.report_playing_at(&conn, PlaybackSide::Remote, 100).await, Some(50));
    assert_eq!(ctrl.report_playing_at(&conn, PlaybackSide::Remote, 250).await, Some(200));

    let report = read_report(&dir, "r1");
    assert!(report.contains("RemoteVideoDelayMs: 50"));
    assert!(report.contains("RemoteVideoDelayMs: 200"));
}

#[tokio::test]
async fn test_elapsed_is_clamped_to_zero() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    let ep = ctrl.store().get("c1").unwrap().endpoint.id.clone();

    let gathering = EngineEvent::IceComponentStateChange { stream_id: 1, component_id: 1, state: IceComponentState::Gathering };
    ctrl.on_engine_event_at("c1", &ep, gathering, 500).await;
    ctrl.on_engine_event_at("c1", &ep, EngineEvent::IceGatheringDone, 300).await;

    // 미디어 수신 전 재생 보고 → 0
    assert_eq!(ctrl.report_playing_at(&conn, PlaybackSide::Local, 700).await, Some(0));

    let report = read_report(&dir, "r1");
    assert!(report.contains("IceDoneTimeMs: 0"));
    assert!(report.contains("LocalVideoDelayMs: 0"));
}

#[tokio::test]
async fn test_local_candidate_forwarded_to_browser() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    drain(&mut rx);
    let ep = ctrl.store().get("c1").unwrap().endpoint.id.clone();

    ctrl.on_engine_event("c1", &ep, EngineEvent::IceCandidateFound(candidate("candidate:local"))).await;

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["ICE_CANDIDATE"]);
    assert_eq!(frames[0]["candidate"], "candidate:local");
    assert_eq!(frames[0]["sdpMid"], "0");
    assert_eq!(frames[0]["sdpMLineIndex"], 0);
    assert!(read_report(&dir, "r1").contains("LocalCandidate: "));
}

#[tokio::test]
async fn test_ice_connecting_status() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    drain(&mut rx);
    let ep = ctrl.store().get("c1").unwrap().endpoint.id.clone();

    let connecting = EngineEvent::IceComponentStateChange { stream_id: 1, component_id: 1, state: IceComponentState::Connecting };
    ctrl.on_engine_event("c1", &ep, connecting.clone()).await;
    ctrl.on_engine_event("c1", &ep, connecting).await;

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["STATUS"]);
    assert_eq!(frames[0]["status"], "ICE_CONNECTING");
}

#[tokio::test]
async fn test_engine_error_event_closes_session() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    drain(&mut rx);
    let ep = ctrl.store().get("c1").unwrap().endpoint.id.clone();

    let error = EngineEvent::Error { description: "ICE failed".into(), code: 40400 };
    assert!(!ctrl.on_engine_event("c1", &ep, error).await);

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["ERROR"]);
    assert_eq!(frames[0]["message"], "[Kurento] ICE failed");
    assert!(!ctrl.store().contains("c1"));
    assert_eq!(engine.releases(), 1);
}

#[tokio::test]
async fn test_engine_error_after_close_is_ignored() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    drain(&mut rx);
    let session = ctrl.store().get("c1").unwrap();
    session.lock().await.phase = SessionPhase::Closed;

    let error = EngineEvent::Error { description: "late".into(), code: 40400 };
    assert!(!ctrl.on_engine_event("c1", &session.endpoint.id, error).await);

    assert!(drain(&mut rx).is_empty(), "닫힌 세션에는 ERROR 를 보내면 안 됩니다.");
    assert_eq!(engine.releases(), 0);
}

#[tokio::test]
async fn test_engine_error_during_negotiation_sends_single_error() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    engine.error_on_offer.store(true, Ordering::Relaxed);
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    assert!(ctrl.handle_offer(&conn, offer("r1", "O")).await.is_err());

    let frames = drain(&mut rx);
    assert_eq!(kinds(&frames), vec!["ERROR"], "ERROR 는 한 번만 전송되어야 합니다.");
    assert_eq!(frames[0]["message"], "[Kurento] Endpoint crashed");
    assert!(!ctrl.store().contains("c1"));
    assert_eq!(engine.releases(), 1);
}

#[tokio::test]
async fn test_events_delivered_through_subscription() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    let session = ctrl.store().get("c1").unwrap();

    assert!(engine.emit(&session.endpoint.id, EngineEvent::IceGatheringDone));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.lock().await.phase, SessionPhase::Active);
    assert!(read_report(&dir, "r1").contains("IceDone: "));

    ctrl.stop("c1", StopReason::Requested).await;
    assert!(!engine.has_subscriber(&session.endpoint.id), "해제 후 구독이 남으면 안 됩니다.");
}

// ----------------------------------------------------------------------------
// [REPORT_*]
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_report_messages_recorded() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, _rx) = connection("c1");

    ctrl.handle_offer(&conn, offer("r1", "O")).await.unwrap();
    ctrl.report_start(&conn).await.unwrap();
    ctrl.report_browser_info(&conn, BrowserInfoPayload { browser_info: "Safari 12.0.3".into() }).await.unwrap();

    let report = read_report(&dir, "r1");
    assert!(report.contains("ReportStart: "));
    assert!(report.contains("BrowserInfo: Safari 12.0.3"));
}

#[tokio::test]
async fn test_report_without_session_is_noop() {
    let dir    = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new();
    let ctrl   = controller(engine.clone(), dir.path());
    let (conn, mut rx) = connection("c1");

    ctrl.report_start(&conn).await.unwrap();
    ctrl.report_playing(&conn, PlaybackSide::Remote).await.unwrap();
    assert_eq!(ctrl.report_playing_at(&conn, PlaybackSide::Local, 10).await, None);

    assert!(drain(&mut rx).is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0, "리포트 파일이 생기면 안 됩니다.");
}
