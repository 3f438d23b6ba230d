// author: kodeholic (powered by Claude)
//
// MediaEngine — 외부 미디어 서버(KMS) 연동 경계
//
// 구조:
//   MediaSessionController
//       └── dyn MediaEngine  (create / invoke / subscribe / release)
//               └── KurentoClient (JSON-RPC over WebSocket)
//
// ICE/SDP/RTP 처리는 전부 엔진 내부 — 여기서는 핸들과 이벤트만 다룬다.
// 엔진 이벤트는 per-kind 콜백 대신 EngineEvent 단일 enum으로 세션 큐에 전달된다.

pub mod kurento;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use kurento::KurentoClient;

// ----------------------------------------------------------------------------
// [핸들] 엔진 객체 식별자 (opaque)
// ----------------------------------------------------------------------------

/// MediaPipeline 핸들 — 세션이 단독 소유
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineHandle {
    pub id: String,
}

/// WebRtcEndpoint 핸들 — 소속 파이프라인 id 포함
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointHandle {
    pub id:          String,
    pub pipeline_id: String,
}

/// ICE candidate (브라우저 RTCIceCandidateInit 과 동일한 필드명)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate:       String,
    pub sdp_mid:         String,
    pub sdp_m_line_index: u32,
}

// ----------------------------------------------------------------------------
// [이벤트] 엔진 → 시그널링 (비동기)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Flowing,
    NotFlowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceComponentState {
    Disconnected,
    Gathering,
    Connecting,
    Connected,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// 엔진 런타임 에러 — 세션 종료 대상
    Error { description: String, code: i64 },
    MediaFlowIn  { state: FlowState, media: MediaKind, pad_name: String },
    MediaFlowOut { state: FlowState, media: MediaKind, pad_name: String },
    ConnectionStateChanged { old_state: String, new_state: String },
    MediaStateChanged      { old_state: String, new_state: String },
    MediaTranscodingStateChange { state: String, bin_name: String, media: MediaKind },
    IceComponentStateChange { stream_id: u32, component_id: u32, state: IceComponentState },
    /// Trickle ICE — 엔진이 찾은 로컬 candidate
    IceCandidateFound(IceCandidate),
    IceGatheringDone,
    NewCandidatePairSelected { stream_id: String, local: String, remote: String },
}

impl EngineEvent {
    /// 로그/트레이스용 이벤트 이름
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Error { .. }                       => "Error",
            EngineEvent::MediaFlowIn { .. }                 => "MediaFlowInStateChange",
            EngineEvent::MediaFlowOut { .. }                => "MediaFlowOutStateChange",
            EngineEvent::ConnectionStateChanged { .. }      => "ConnectionStateChanged",
            EngineEvent::MediaStateChanged { .. }           => "MediaStateChanged",
            EngineEvent::MediaTranscodingStateChange { .. } => "MediaTranscodingStateChange",
            EngineEvent::IceComponentStateChange { .. }     => "IceComponentStateChange",
            EngineEvent::IceCandidateFound(_)               => "IceCandidateFound",
            EngineEvent::IceGatheringDone                   => "IceGatheringDone",
            EngineEvent::NewCandidatePairSelected { .. }    => "NewCandidatePairSelected",
        }
    }
}

/// 세션별 이벤트 큐 송신자 — subscribe 시 엔진에 넘긴다
/// unbounded: 엔진 수신 태스크는 모든 세션이 공유하므로 한 세션의 적체로 멈추면 안 된다
pub type EngineEventTx = mpsc::UnboundedSender<EngineEvent>;

// ----------------------------------------------------------------------------
// [에러]
// ----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("call timed out after {0}ms")]
    Timeout(u64),
    #[error("engine connection closed")]
    Closed,
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

// ----------------------------------------------------------------------------
// [MediaEngine] 좁은 RPC 인터페이스
// ----------------------------------------------------------------------------

#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn create_pipeline(&self) -> EngineResult<PipelineHandle>;

    async fn create_endpoint(&self, pipeline: &PipelineHandle) -> EngineResult<EndpointHandle>;

    /// 엔드포인트의 모든 이벤트 종류를 구독하고 events 큐로 전달
    /// 반드시 process_offer 이전에 호출 (초기 이벤트 유실 방지)
    async fn subscribe(&self, endpoint: &EndpointHandle, events: EngineEventTx) -> EngineResult<()>;

    /// source 미디어를 sink로 연결 (loopback이면 동일 엔드포인트)
    async fn connect(&self, source: &EndpointHandle, sink: &EndpointHandle) -> EngineResult<()>;

    /// SDP Offer 처리 → SDP Answer
    async fn process_offer(&self, endpoint: &EndpointHandle, sdp_offer: &str) -> EngineResult<String>;

    async fn add_ice_candidate(&self, endpoint: &EndpointHandle, candidate: &IceCandidate) -> EngineResult<()>;

    /// 로컬 candidate 수집 시작 — 이 시점부터 엔드포인트가 실제로 동작
    async fn gather_candidates(&self, endpoint: &EndpointHandle) -> EngineResult<()>;

    /// 파이프라인 해제 (하위 엔드포인트 포함). 이미 해제된 경우에도 Ok
    async fn release_pipeline(&self, pipeline: &PipelineHandle) -> EngineResult<()>;
}
