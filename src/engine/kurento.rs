// author: kodeholic (powered by Claude)
//
// KurentoClient — KMS JSON-RPC over WebSocket
//
// 구조:
//   call()  ──(out_tx)──▶ [writer task] ──▶ KMS
//   KMS ──▶ [reader task] ─┬─ Response → pending[id] (oneshot)
//                          └─ onEvent  → subscribers[object] (세션 이벤트 큐)
//   [ping task] 주기적으로 ping 전송 (KMS 세션 유지)
//
// 연결이 끊기면 pending 전부 Closed 로 실패시키고 구독 큐를 drop 한다
// (세션 이벤트 펌프는 큐가 닫히면 자연 종료).
// reader 는 구독 큐에서 대기하지 않는다 — 한 세션의 적체가 다른 세션의 응답을 막으면 안 됨.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::config;

use super::rpc::{self, Incoming, RpcRequest};
use super::{
    EndpointHandle, EngineError, EngineEventTx, EngineResult, IceCandidate, MediaEngine,
    PipelineHandle,
};

type PendingMap = HashMap<u64, oneshot::Sender<EngineResult<Value>>>;

/// 구독 항목 — 파이프라인 release 시 일괄 정리하기 위해 소속 파이프라인 보관
struct Subscription {
    pipeline_id: String,
    tx:          EngineEventTx,
}

struct Shared {
    pending:     Mutex<PendingMap>,
    subscribers: Mutex<HashMap<String, Subscription>>,
    session_id:  Mutex<Option<String>>,
}

pub struct KurentoClient {
    url:          String,
    next_id:      AtomicU64,
    out_tx:       mpsc::Sender<String>,
    shared:       Arc<Shared>,
    call_timeout: Duration,
}

impl KurentoClient {
    /// KMS 연결 + writer/reader/ping 태스크 기동
    pub async fn connect(url: &str, call_timeout: Duration) -> EngineResult<Arc<Self>> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(config::EGRESS_QUEUE_SIZE);

        let shared = Arc::new(Shared {
            pending:     Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            session_id:  Mutex::new(None),
        });

        // [writer] out_rx → KMS
        tokio::spawn(async move {
            while let Some(json) = out_rx.recv().await {
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    warn!("[kms] send failed, writer stopped");
                    break;
                }
            }
        });

        // [reader] KMS → pending / subscribers
        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                let text = match msg {
                    Ok(Message::Text(t))  => t,
                    Ok(Message::Close(_)) => break,
                    Err(e) => { warn!("[kms] read error: {}", e); break; }
                    _ => continue,
                };
                reader_shared.dispatch(text.as_str());
            }
            reader_shared.fail_all();
            warn!("[kms] connection closed");
        });

        let client = Arc::new(Self {
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            out_tx,
            shared,
            call_timeout,
        });

        // [ping] KMS 세션 keepalive — 클라이언트가 drop 되면 종료
        let weak = Arc::downgrade(&client);
        tokio::spawn(async move {
            let period = Duration::from_millis(config::KMS_PING_INTERVAL_MS);
            let mut timer = tokio::time::interval(period);
            timer.tick().await; // 첫 틱 skip
            loop {
                timer.tick().await;
                let Some(client) = weak.upgrade() else { break };
                if let Err(e) = client.call("ping", json!({ "interval": config::KMS_PING_INTERVAL_MS })).await {
                    warn!("[kms] ping failed: {}", e);
                }
            }
        });

        info!("[kms] connected to {}", url);
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// JSON-RPC 요청 1건 — 응답 또는 타임아웃까지 대기
    async fn call(&self, method: &str, mut params: Value) -> EngineResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Some(sid) = self.shared.session_id.lock().unwrap().clone() {
            params["sessionId"] = Value::String(sid);
        }

        let request = serde_json::to_string(&RpcRequest::new(id, method, params))
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().unwrap().insert(id, tx);

        trace!("[kms] → {}", request);
        if self.out_tx.send(request).await.is_err() {
            self.shared.pending.lock().unwrap().remove(&id);
            return Err(EngineError::Closed);
        }

        let timeout_ms = self.call_timeout.as_millis() as u64;
        let outcome = match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_))      => Err(EngineError::Closed),
            Err(_) => {
                self.shared.pending.lock().unwrap().remove(&id);
                Err(EngineError::Timeout(timeout_ms))
            }
        }?;

        if let Some(sid) = outcome.get("sessionId").and_then(Value::as_str) {
            let mut current = self.shared.session_id.lock().unwrap();
            if current.is_none() {
                debug!("[kms] sessionId={}", sid);
                *current = Some(sid.to_string());
            }
        }
        Ok(outcome)
    }

    async fn invoke(&self, object: &str, operation: &str, operation_params: Value) -> EngineResult<Value> {
        self.call("invoke", rpc::invoke_params(object, operation, operation_params)).await
    }
}

impl Shared {
    fn dispatch(&self, text: &str) {
        trace!("[kms] ← {}", text);
        match rpc::parse_incoming(text) {
            Ok(Incoming::Response { id, outcome }) => {
                let waiter = self.pending.lock().unwrap().remove(&id);
                match waiter {
                    Some(tx) => { let _ = tx.send(outcome); }
                    None     => debug!("[kms] late response id={} (timed out)", id),
                }
            }
            Ok(Incoming::Event { object, event }) => {
                let tx = self.subscribers.lock().unwrap().get(&object).map(|s| s.tx.clone());
                match tx {
                    Some(tx) => {
                        if tx.send(event).is_err() {
                            debug!("[kms] event dropped, subscriber gone object={}", object);
                        }
                    }
                    None => debug!("[kms] event for unsubscribed object={}", object),
                }
            }
            Ok(Incoming::Ignored(what)) => trace!("[kms] ignored {}", what),
            Err(e) => warn!("[kms] bad frame: {}", e),
        }
    }

    fn fail_all(&self) {
        let pending: Vec<_> = self.pending.lock().unwrap().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(EngineError::Closed));
        }
        self.subscribers.lock().unwrap().clear();
    }
}

#[async_trait]
impl MediaEngine for KurentoClient {
    async fn create_pipeline(&self) -> EngineResult<PipelineHandle> {
        let result = self.call("create", rpc::create_params("MediaPipeline", json!({}))).await?;
        Ok(PipelineHandle { id: rpc::result_value_str(&result)? })
    }

    async fn create_endpoint(&self, pipeline: &PipelineHandle) -> EngineResult<EndpointHandle> {
        let result = self.call("create", rpc::create_params(
            "WebRtcEndpoint",
            json!({ "mediaPipeline": pipeline.id }),
        )).await?;
        Ok(EndpointHandle {
            id:          rpc::result_value_str(&result)?,
            pipeline_id: pipeline.id.clone(),
        })
    }

    async fn subscribe(&self, endpoint: &EndpointHandle, events: EngineEventTx) -> EngineResult<()> {
        // 구독 요청 전에 큐 등록 — 응답보다 먼저 도착하는 이벤트 유실 방지
        self.shared.subscribers.lock().unwrap().insert(endpoint.id.clone(), Subscription {
            pipeline_id: endpoint.pipeline_id.clone(),
            tx:          events,
        });
        for event_type in rpc::SUBSCRIBED_EVENTS {
            self.call("subscribe", rpc::subscribe_params(&endpoint.id, event_type)).await?;
        }
        Ok(())
    }

    async fn connect(&self, source: &EndpointHandle, sink: &EndpointHandle) -> EngineResult<()> {
        self.invoke(&source.id, "connect", json!({ "sink": sink.id })).await.map(|_| ())
    }

    async fn process_offer(&self, endpoint: &EndpointHandle, sdp_offer: &str) -> EngineResult<String> {
        let result = self.invoke(&endpoint.id, "processOffer", json!({ "offer": sdp_offer })).await?;
        rpc::result_value_str(&result)
    }

    async fn add_ice_candidate(&self, endpoint: &EndpointHandle, candidate: &IceCandidate) -> EngineResult<()> {
        self.invoke(&endpoint.id, "addIceCandidate", rpc::candidate_param(candidate)).await.map(|_| ())
    }

    async fn gather_candidates(&self, endpoint: &EndpointHandle) -> EngineResult<()> {
        self.invoke(&endpoint.id, "gatherCandidates", json!({})).await.map(|_| ())
    }

    async fn release_pipeline(&self, pipeline: &PipelineHandle) -> EngineResult<()> {
        self.shared.subscribers.lock().unwrap()
            .retain(|_, sub| sub.pipeline_id != pipeline.id);

        match self.call("release", rpc::release_params(&pipeline.id)).await {
            Ok(_) => Ok(()),
            Err(EngineError::Rpc { code, .. }) if code == config::KMS_OBJECT_NOT_FOUND => {
                debug!("[kms] pipeline already released: {}", pipeline.id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
