// author: kodeholic (powered by Claude)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::IceCandidate;
use crate::error::{SignalError, SignalResult};

use super::kind::{client, server};

// ----------------------------------------------------------------------------
// [공통] 시그널링 패킷 봉투 (Envelope)
// ----------------------------------------------------------------------------

/// 모든 수신 WebSocket 메시지의 최상위 구조체
/// kind 를 제외한 나머지 필드는 kind 에 따라 해석합니다.
///
/// 예시:
///   { "kind": "OFFER", "reportId": "r1", "sdpOffer": "v=0..." }
#[derive(Deserialize, Debug)]
pub struct GatewayPacket {
    pub kind: String,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

// ----------------------------------------------------------------------------
// [C→S] 클라이언트 요청 payload 타입들
// ----------------------------------------------------------------------------

/// kind: OFFER
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub report_id: String,
    pub sdp_offer: String,
}

/// kind: CLIENT_ERROR
#[derive(Deserialize, Debug, Clone)]
pub struct ClientErrorPayload {
    pub message: String,
}

/// kind: REPORT_BROWSER_INFO
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrowserInfoPayload {
    #[serde(default)]
    pub browser_info: String,
}

/// 해석이 끝난 수신 메시지
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Offer(OfferPayload),
    IceCandidate(IceCandidate),
    Stop,
    ClientError(ClientErrorPayload),
    ReportStart,
    ReportBrowserInfo(BrowserInfoPayload),
    ReportLocalPlaying,
    ReportRemotePlaying,
    /// 인식하지 못한 kind — 무시 대상 (에러 아님)
    Unknown(String),
}

impl ClientMessage {
    pub fn kind(&self) -> &str {
        match self {
            ClientMessage::Offer(_)             => client::OFFER,
            ClientMessage::IceCandidate(_)      => client::ICE_CANDIDATE,
            ClientMessage::Stop                 => client::STOP,
            ClientMessage::ClientError(_)       => client::CLIENT_ERROR,
            ClientMessage::ReportStart          => client::REPORT_START,
            ClientMessage::ReportBrowserInfo(_) => client::REPORT_BROWSER_INFO,
            ClientMessage::ReportLocalPlaying   => client::REPORT_LOCAL_PLAYING,
            ClientMessage::ReportRemotePlaying  => client::REPORT_REMOTE_PLAYING,
            ClientMessage::Unknown(kind)        => kind,
        }
    }
}

/// 원문 → ClientMessage
/// JSON 아님 / kind 누락 / 필수 필드 누락은 InvalidPayload
pub fn parse_client_message(text: &str) -> SignalResult<ClientMessage> {
    let packet: GatewayPacket = serde_json::from_str(text)
        .map_err(|e| SignalError::InvalidPayload(e.to_string()))?;

    let message = match packet.kind.as_str() {
        client::OFFER                 => ClientMessage::Offer(parse_payload(packet.body)?),
        client::ICE_CANDIDATE         => ClientMessage::IceCandidate(parse_payload(packet.body)?),
        client::STOP                  => ClientMessage::Stop,
        client::CLIENT_ERROR          => ClientMessage::ClientError(parse_payload(packet.body)?),
        client::REPORT_START          => ClientMessage::ReportStart,
        client::REPORT_BROWSER_INFO   => ClientMessage::ReportBrowserInfo(parse_payload(packet.body)?),
        client::REPORT_LOCAL_PLAYING  => ClientMessage::ReportLocalPlaying,
        client::REPORT_REMOTE_PLAYING => ClientMessage::ReportRemotePlaying,
        _                             => ClientMessage::Unknown(packet.kind),
    };
    Ok(message)
}

fn parse_payload<T: serde::de::DeserializeOwned>(body: Map<String, Value>) -> SignalResult<T> {
    serde_json::from_value(Value::Object(body)).map_err(|e| SignalError::InvalidPayload(e.to_string()))
}

// ----------------------------------------------------------------------------
// [S→C] 서버 송신 메시지
// ----------------------------------------------------------------------------

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    MediaFlowing,
    IceConnecting,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    SdpAnswer {
        #[serde(rename = "sdpAnswer")]
        sdp_answer: String,
    },
    IceCandidate(IceCandidate),
    Error { message: String },
    Status { status: Status },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::SdpAnswer { .. }  => server::SDP_ANSWER,
            ServerMessage::IceCandidate(_)   => server::ICE_CANDIDATE,
            ServerMessage::Error { .. }      => server::ERROR,
            ServerMessage::Status { .. }     => server::STATUS,
        }
    }
}

pub fn encode(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).unwrap_or_default()
}
