// author: kodeholic (powered by Claude)
// 테스트용 가짜 MediaEngine — 호출 기록 + 이벤트 주입

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use mini_kurento_signal::controller::MediaSessionController;
use mini_kurento_signal::core::{Connection, SessionStore};
use mini_kurento_signal::engine::{
    EndpointHandle, EngineError, EngineEvent, EngineEventTx, EngineResult, IceCandidate,
    MediaEngine, PipelineHandle,
};
use mini_kurento_signal::trace::TraceHub;

pub const FAKE_ANSWER: &str = "v=0 fake-answer";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreatePipeline,
    CreateEndpoint(String),
    Subscribe(String),
    Connect(String, String),
    ProcessOffer(String, String),
    AddIceCandidate(String, String),
    GatherCandidates(String),
    ReleasePipeline(String),
}

#[derive(Default)]
pub struct FakeEngine {
    next_id:            AtomicU64,
    calls:              Mutex<Vec<Call>>,
    /// endpoint id → (pipeline id, 이벤트 큐)
    subscribers:        Mutex<HashMap<String, (String, EngineEventTx)>>,
    pub fail_offer:     AtomicBool,
    /// processOffer 도중 엔진 Error 이벤트 발생 후 실패
    pub error_on_offer: AtomicBool,
    pub fail_candidate: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn has_subscriber(&self, endpoint_id: &str) -> bool {
        self.subscribers.lock().unwrap().contains_key(endpoint_id)
    }

    pub fn releases(&self) -> usize {
        self.count(|c| matches!(c, Call::ReleasePipeline(_)))
    }

    /// 엔진 이벤트 주입 — 구독자 없으면 false
    pub fn emit(&self, endpoint_id: &str, event: EngineEvent) -> bool {
        let tx = self.subscribers.lock().unwrap().get(endpoint_id).map(|(_, tx)| tx.clone());
        match tx {
            Some(tx) => tx.send(event).is_ok(),
            None     => false,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn create_pipeline(&self) -> EngineResult<PipelineHandle> {
        self.record(Call::CreatePipeline);
        Ok(PipelineHandle { id: self.next("pipe") })
    }

    async fn create_endpoint(&self, pipeline: &PipelineHandle) -> EngineResult<EndpointHandle> {
        self.record(Call::CreateEndpoint(pipeline.id.clone()));
        Ok(EndpointHandle { id: self.next("ep"), pipeline_id: pipeline.id.clone() })
    }

    async fn subscribe(&self, endpoint: &EndpointHandle, events: EngineEventTx) -> EngineResult<()> {
        self.record(Call::Subscribe(endpoint.id.clone()));
        self.subscribers.lock().unwrap()
            .insert(endpoint.id.clone(), (endpoint.pipeline_id.clone(), events));
        Ok(())
    }

    async fn connect(&self, source: &EndpointHandle, sink: &EndpointHandle) -> EngineResult<()> {
        self.record(Call::Connect(source.id.clone(), sink.id.clone()));
        Ok(())
    }

    async fn process_offer(&self, endpoint: &EndpointHandle, sdp_offer: &str) -> EngineResult<String> {
        self.record(Call::ProcessOffer(endpoint.id.clone(), sdp_offer.to_string()));
        if self.error_on_offer.load(Ordering::Relaxed) {
            self.emit(&endpoint.id, EngineEvent::Error { description: "Endpoint crashed".into(), code: 40001 });
            // 이벤트 펌프가 Error 를 처리할 시간
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            return Err(EngineError::Rpc { code: 40101, message: "Object not found".into() });
        }
        if self.fail_offer.load(Ordering::Relaxed) {
            return Err(EngineError::Rpc { code: 40208, message: "SDP parse error".into() });
        }
        Ok(FAKE_ANSWER.to_string())
    }

    async fn add_ice_candidate(&self, endpoint: &EndpointHandle, candidate: &IceCandidate) -> EngineResult<()> {
        self.record(Call::AddIceCandidate(endpoint.id.clone(), candidate.candidate.clone()));
        if self.fail_candidate.load(Ordering::Relaxed) {
            return Err(EngineError::Timeout(10));
        }
        Ok(())
    }

    async fn gather_candidates(&self, endpoint: &EndpointHandle) -> EngineResult<()> {
        self.record(Call::GatherCandidates(endpoint.id.clone()));
        Ok(())
    }

    async fn release_pipeline(&self, pipeline: &PipelineHandle) -> EngineResult<()> {
        self.record(Call::ReleasePipeline(pipeline.id.clone()));
        // 파이프라인과 함께 구독도 소멸
        self.subscribers.lock().unwrap().retain(|_, (pipe, _)| pipe != &pipeline.id);
        Ok(())
    }
}

pub fn controller(engine: Arc<FakeEngine>, dir: &Path) -> Arc<MediaSessionController> {
    MediaSessionController::new(Arc::new(SessionStore::new()), engine, dir.to_path_buf())
}

/// 연결 + 송신 프레임 수신자
pub fn connection(id: &str) -> (Connection, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(64);
    (Connection::new(id, tx, TraceHub::new()), rx)
}

/// 지금까지 쌓인 송신 프레임 (JSON)
pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

pub fn kinds(frames: &[serde_json::Value]) -> Vec<String> {
    frames.iter().map(|f| f["kind"].as_str().unwrap_or_default().to_string()).collect()
}
