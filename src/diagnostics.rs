// author: kodeholic (powered by Claude)
//
// DiagnosticsRecorder — 세션별 Safari 진단 리포트 (report_<reportId>.log)
//
// 한 줄 = "Key: value". 매 기록마다 flush — 프로세스가 비정상 종료돼도
// 그 시점까지의 리포트는 남는다.
//
// 타임스탬프 규칙:
//   ice_start / media_flow : 최초 기록만 유지 (ICE 재시작, 디코더 에러로 인한 flapping 무시)
//   경과 시간              : 음수면 0 (엔진 재전송으로 done 이 start 보다 먼저 올 수 있음)
//
// 싱크가 이미 닫힌 뒤의 기록은 전부 no-op. I/O 실패는 로그만 남기고 삼킨다.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config;
use crate::error::{SignalError, SignalResult};
use crate::utils::{format_elapsed, format_wall_time};

/// ICE candidate 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// 엔진이 수집한 로컬 candidate
    Local,
    /// 브라우저가 보낸 원격 candidate
    Remote,
}

impl CandidateOrigin {
    fn key(self) -> &'static str {
        match self {
            CandidateOrigin::Local  => "LocalCandidate",
            CandidateOrigin::Remote => "RemoteCandidate",
        }
    }
}

/// 재생 시작 보고 주체
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSide {
    Local,
    Remote,
}

impl PlaybackSide {
    fn prefix(self) -> &'static str {
        match self {
            PlaybackSide::Local  => "LocalVideo",
            PlaybackSide::Remote => "RemoteVideo",
        }
    }
}

/// reportId 검증 — 파일명으로 쓰이므로 [A-Za-z0-9_-] 만 허용
pub fn validate_report_id(report_id: &str) -> SignalResult<()> {
    let valid = !report_id.is_empty()
        && report_id.len() <= config::MAX_REPORT_ID_LEN
        && report_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SignalError::InvalidReportId(report_id.to_string()))
    }
}

pub fn report_path(dir: &Path, report_id: &str) -> PathBuf {
    dir.join(format!("{}{}.{}", config::REPORT_FILE_PREFIX, report_id, config::REPORT_FILE_EXT))
}

// ----------------------------------------------------------------------------
// [DiagnosticsRecorder]
// ----------------------------------------------------------------------------

pub struct DiagnosticsRecorder {
    report_id:     String,
    path:          PathBuf,
    sink:          Option<File>,
    ice_start_ms:  Option<u64>,
    media_flow_ms: Option<u64>,
}

impl DiagnosticsRecorder {
    /// 리포트 파일 생성 (기존 파일은 덮어씀) + 헤더 기록
    pub async fn open(dir: &Path, report_id: &str, now_ms: u64) -> SignalResult<Self> {
        validate_report_id(report_id)?;
        let path = report_path(dir, report_id);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        info!("[report] opened {}", path.display());

        let mut recorder = Self {
            report_id: report_id.to_string(),
            path,
            sink: Some(file),
            ice_start_ms: None,
            media_flow_ms: None,
        };
        recorder.write(&format!("ReportId: {}\nReportOpened: {}\n",
            report_id, format_wall_time(now_ms))).await;
        Ok(recorder)
    }

    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    pub fn ice_start_ms(&self) -> Option<u64> {
        self.ice_start_ms
    }

    pub fn media_flow_ms(&self) -> Option<u64> {
        self.media_flow_ms
    }

    /// 싱크 닫기 — 최초 1회만 true
    pub async fn close(&mut self) -> bool {
        match self.sink.take() {
            Some(mut file) => {
                if let Err(e) = file.flush().await {
                    warn!("[report] flush on close failed {}: {}", self.path.display(), e);
                }
                info!("[report] closed {}", self.path.display());
                true
            }
            None => false,
        }
    }

    /// 한 블록 기록 + flush. 싱크 없으면 false
    async fn write(&mut self, text: &str) -> bool {
        let Some(file) = self.sink.as_mut() else {
            debug!("[report] skip, sink closed: {}", self.report_id);
            return false;
        };
        let result = async {
            file.write_all(text.as_bytes()).await?;
            file.flush().await
        }.await;
        if let Err(e) = result {
            warn!("[report] write failed {}: {}", self.path.display(), e);
        }
        true
    }

    // ------------------------------------------------------------------------
    // [기록 항목]
    // ------------------------------------------------------------------------

    /// 사용자가 Start 를 누름
    pub async fn record_start(&mut self, now_ms: u64) {
        self.write(&format!("ReportStart: {}\n", format_wall_time(now_ms))).await;
    }

    pub async fn record_browser_info(&mut self, browser_info: &str) {
        self.write(&format!("\nBrowserInfo: {}\n", browser_info)).await;
    }

    pub async fn record_sdp(&mut self, sdp_offer: &str, sdp_answer: &str) {
        self.write(&format!("SdpOffer: {}\nSdpAnswer: {}\n", sdp_offer, sdp_answer)).await;
    }

    pub async fn record_candidate(&mut self, origin: CandidateOrigin, candidate_json: &str) {
        self.write(&format!("{}: {}\n", origin.key(), candidate_json)).await;
    }

    /// ICE 수집 시작 — 최초 시각만 저장
    pub async fn record_ice_start(&mut self, now_ms: u64) {
        if !self.is_open() { return; }
        self.ice_start_ms.get_or_insert(now_ms);
        self.write(&format!("IceStart: {}\n", format_wall_time(now_ms))).await;
    }

    /// ICE 수집 완료 — start 대비 경과 (start 미기록 시 0)
    pub async fn record_ice_done(&mut self, now_ms: u64) -> Option<u64> {
        if !self.is_open() { return None; }
        let elapsed = now_ms.saturating_sub(self.ice_start_ms.unwrap_or(now_ms));
        self.write(&format!(
            "IceDone: {}\nIceDoneTime: {}\nIceDoneTimeMs: {}\n",
            format_wall_time(now_ms), format_elapsed(elapsed), elapsed,
        )).await;
        Some(elapsed)
    }

    /// 원격 미디어 최초 수신 — 최초 시각만 저장
    pub async fn record_media_flow(&mut self, now_ms: u64) {
        if !self.is_open() { return; }
        self.media_flow_ms.get_or_insert(now_ms);
        self.write(&format!("RemoteMediaFlow: {}\n", format_wall_time(now_ms))).await;
    }

    /// 비디오 재생 시작 — 최초 미디어 수신 대비 경과 (미수신 시 0)
    pub async fn record_playing(&mut self, side: PlaybackSide, now_ms: u64) -> Option<u64> {
        if !self.is_open() { return None; }
        let elapsed = now_ms.saturating_sub(self.media_flow_ms.unwrap_or(now_ms));
        let prefix  = side.prefix();
        self.write(&format!(
            "{p}Playing: {}\n{p}Delay: {}\n{p}DelayMs: {}\n",
            format_wall_time(now_ms), format_elapsed(elapsed), elapsed, p = prefix,
        )).await;
        Some(elapsed)
    }
}
