// author: kodeholic (powered by Claude)

/// Client → Server kinds
pub mod client {
    /// SDP Offer + 리포트 id — 세션 생성
    pub const OFFER:          &str = "OFFER";
    /// 브라우저 Trickle ICE candidate
    pub const ICE_CANDIDATE:  &str = "ICE_CANDIDATE";
    /// 세션 종료 요청
    pub const STOP:           &str = "STOP";
    /// 브라우저 측 에러 — 상대가 멈춘 것으로 간주하고 종료
    pub const CLIENT_ERROR:   &str = "CLIENT_ERROR";

    // --- Safari 진단 리포트 ---
    /// 사용자가 Start 버튼 클릭
    pub const REPORT_START:          &str = "REPORT_START";
    /// 브라우저/하드웨어 정보 (free-text)
    pub const REPORT_BROWSER_INFO:   &str = "REPORT_BROWSER_INFO";
    /// 로컬 비디오 재생 시작
    pub const REPORT_LOCAL_PLAYING:  &str = "REPORT_LOCAL_PLAYING";
    /// 원격(loopback) 비디오 재생 시작
    pub const REPORT_REMOTE_PLAYING: &str = "REPORT_REMOTE_PLAYING";
}

/// Server → Client kinds
pub mod server {
    /// Offer 처리 결과
    pub const SDP_ANSWER:    &str = "SDP_ANSWER";
    /// 엔진이 찾은 로컬 candidate
    pub const ICE_CANDIDATE: &str = "ICE_CANDIDATE";
    /// 에러 통지 (연결은 유지)
    pub const ERROR:         &str = "ERROR";
    /// 진행 상태 (MEDIA_FLOWING / ICE_CONNECTING)
    pub const STATUS:        &str = "STATUS";
}
