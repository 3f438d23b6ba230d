// author: kodeholic (powered by Claude)
//
// KMS JSON-RPC 2.0 메시지 포맷
//
// 요청:  { "jsonrpc": "2.0", "id": 1, "method": "create", "params": { ... } }
// 응답:  { "jsonrpc": "2.0", "id": 1, "result": { "value": "...", "sessionId": "..." } }
// 에러:  { "jsonrpc": "2.0", "id": 1, "error": { "code": 40101, "message": "..." } }
// 이벤트: { "jsonrpc": "2.0", "method": "onEvent",
//          "params": { "value": { "type": "IceGatheringDone", "object": "...", "data": { ... } } } }

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{EngineError, EngineEvent, FlowState, IceCandidate, IceComponentState, MediaKind};

/// 엔드포인트 생성 직후 구독하는 이벤트 종류 (KMS 이벤트 타입명)
pub const SUBSCRIBED_EVENTS: &[&str] = &[
    "Error",
    "MediaFlowInStateChange",
    "MediaFlowOutStateChange",
    "ConnectionStateChanged",
    "MediaStateChanged",
    "MediaTranscodingStateChange",
    "IceCandidateFound",
    "IceComponentStateChange",
    "IceGatheringDone",
    "NewCandidatePairSelected",
];

// ----------------------------------------------------------------------------
// [요청]
// ----------------------------------------------------------------------------

#[derive(Serialize, Debug)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id:      u64,
    pub method:  &'a str,
    pub params:  Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self { jsonrpc: "2.0", id, method, params }
    }
}

pub fn create_params(kind: &str, constructor: Value) -> Value {
    json!({ "type": kind, "constructorParams": constructor, "properties": {} })
}

pub fn invoke_params(object: &str, operation: &str, operation_params: Value) -> Value {
    json!({ "object": object, "operation": operation, "operationParams": operation_params })
}

pub fn subscribe_params(object: &str, event_type: &str) -> Value {
    json!({ "object": object, "type": event_type })
}

pub fn release_params(object: &str) -> Value {
    json!({ "object": object })
}

/// addIceCandidate 인자 — KMS 복합 타입 표기(__module__/__type__) 필요
pub fn candidate_param(candidate: &IceCandidate) -> Value {
    json!({
        "candidate": {
            "__module__":    "kurento",
            "__type__":      "IceCandidate",
            "candidate":     candidate.candidate,
            "sdpMid":        candidate.sdp_mid,
            "sdpMLineIndex": candidate.sdp_m_line_index,
        }
    })
}

// ----------------------------------------------------------------------------
// [수신] 응답 / 알림 구분
// ----------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
struct RpcErrorBody {
    code:    i64,
    message: String,
}

#[derive(Deserialize, Debug)]
struct RawIncoming {
    id:     Option<u64>,
    method: Option<String>,
    params: Option<Value>,
    result: Option<Value>,
    error:  Option<RpcErrorBody>,
}

/// KMS에서 수신한 프레임 분류 결과
#[derive(Debug)]
pub enum Incoming {
    Response { id: u64, outcome: Result<Value, EngineError> },
    Event { object: String, event: EngineEvent },
    /// 처리 대상이 아닌 알림 / 알 수 없는 이벤트
    Ignored(String),
}

pub fn parse_incoming(text: &str) -> Result<Incoming, EngineError> {
    let raw: RawIncoming = serde_json::from_str(text)
        .map_err(|e| EngineError::UnexpectedResponse(e.to_string()))?;

    if let Some(id) = raw.id {
        if let Some(err) = raw.error {
            return Ok(Incoming::Response {
                id,
                outcome: Err(EngineError::Rpc { code: err.code, message: err.message }),
            });
        }
        if raw.method.is_none() {
            return Ok(Incoming::Response { id, outcome: Ok(raw.result.unwrap_or(Value::Null)) });
        }
    }

    match raw.method.as_deref() {
        Some("onEvent") => {
            let value = raw.params
                .as_ref()
                .and_then(|p| p.get("value"))
                .ok_or_else(|| EngineError::UnexpectedResponse("onEvent without value".into()))?;
            let event_type = value["type"].as_str().unwrap_or_default();
            let object     = value["object"].as_str().unwrap_or_default().to_string();
            match decode_event(event_type, &value["data"]) {
                Some(event) => Ok(Incoming::Event { object, event }),
                None        => Ok(Incoming::Ignored(format!("event {}", event_type))),
            }
        }
        Some(other) => Ok(Incoming::Ignored(format!("method {}", other))),
        None        => Ok(Incoming::Ignored("frame without id/method".into())),
    }
}

/// result.value (문자열) 추출 — create / processOffer 응답
pub fn result_value_str(result: &Value) -> Result<String, EngineError> {
    result.get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::UnexpectedResponse(format!("missing result.value: {}", result)))
}

// ----------------------------------------------------------------------------
// [이벤트 디코딩] KMS data → EngineEvent
// ----------------------------------------------------------------------------

fn str_field(data: &Value, key: &str) -> String {
    data[key].as_str().unwrap_or_default().to_string()
}

fn media_kind(data: &Value) -> MediaKind {
    match data["mediaType"].as_str() {
        Some("AUDIO") => MediaKind::Audio,
        Some("VIDEO") => MediaKind::Video,
        _             => MediaKind::Data,
    }
}

fn flow_state(data: &Value) -> FlowState {
    match data["state"].as_str() {
        Some("FLOWING") => FlowState::Flowing,
        _               => FlowState::NotFlowing,
    }
}

fn ice_state(raw: &str) -> Option<IceComponentState> {
    Some(match raw {
        "DISCONNECTED" => IceComponentState::Disconnected,
        "GATHERING"    => IceComponentState::Gathering,
        "CONNECTING"   => IceComponentState::Connecting,
        "CONNECTED"    => IceComponentState::Connected,
        "READY"        => IceComponentState::Ready,
        "FAILED"       => IceComponentState::Failed,
        _              => return None,
    })
}

pub fn decode_event(event_type: &str, data: &Value) -> Option<EngineEvent> {
    let event = match event_type {
        "Error" => EngineEvent::Error {
            description: str_field(data, "description"),
            code:        data["errorCode"].as_i64().unwrap_or_default(),
        },
        "MediaFlowInStateChange" => EngineEvent::MediaFlowIn {
            state:    flow_state(data),
            media:    media_kind(data),
            pad_name: str_field(data, "padName"),
        },
        "MediaFlowOutStateChange" => EngineEvent::MediaFlowOut {
            state:    flow_state(data),
            media:    media_kind(data),
            pad_name: str_field(data, "padName"),
        },
        "ConnectionStateChanged" => EngineEvent::ConnectionStateChanged {
            old_state: str_field(data, "oldState"),
            new_state: str_field(data, "newState"),
        },
        "MediaStateChanged" => EngineEvent::MediaStateChanged {
            old_state: str_field(data, "oldState"),
            new_state: str_field(data, "newState"),
        },
        "MediaTranscodingStateChange" => EngineEvent::MediaTranscodingStateChange {
            state:    str_field(data, "state"),
            bin_name: str_field(data, "binName"),
            media:    media_kind(data),
        },
        "IceComponentStateChange" => EngineEvent::IceComponentStateChange {
            stream_id:    data["streamId"].as_u64().unwrap_or_default() as u32,
            component_id: data["componentId"].as_u64().unwrap_or_default() as u32,
            state:        ice_state(data["state"].as_str()?)?,
        },
        "IceCandidateFound" => {
            let c = &data["candidate"];
            EngineEvent::IceCandidateFound(IceCandidate {
                candidate:        c["candidate"].as_str()?.to_string(),
                sdp_mid:          str_field(c, "sdpMid"),
                sdp_m_line_index: c["sdpMLineIndex"].as_u64().unwrap_or_default() as u32,
            })
        }
        "IceGatheringDone" => EngineEvent::IceGatheringDone,
        "NewCandidatePairSelected" => {
            let pair = &data["candidatePair"];
            EngineEvent::NewCandidatePairSelected {
                stream_id: str_field(pair, "streamID"),
                local:     str_field(pair, "localCandidate"),
                remote:    str_field(pair, "remoteCandidate"),
            }
        }
        _ => return None,
    };
    Some(event)
}
