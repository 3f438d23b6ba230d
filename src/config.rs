// author: kodeholic (powered by Claude)
// 매직 넘버를 배제하고 시스템 전체의 성능과 한계를 제어하는 상수 모음입니다.

/// 웹소켓 시그널링 서버 TCP 포트
pub const SIGNALING_PORT: u16 = 8080;

/// Kurento Media Server JSON-RPC 기본 주소
/// 운영 환경에서는 환경변수 KMS_URL 로 오버라이드 할 것
pub const DEFAULT_KMS_URL: &str = "ws://localhost:8888/kurento";

/// 연결별 송신(Egress) 큐 사이즈.
/// 꽉 차면 해당 연결의 송신은 대기합니다 (세션 간 간섭 없음).
pub const EGRESS_QUEUE_SIZE: usize = 256;

/// KMS JSON-RPC 요청 1건의 최대 대기 시간 (10초)
/// 초과 시 협상 실패로 간주하고 세션을 닫습니다.
pub const ENGINE_CALL_TIMEOUT_MS: u64 = 10_000;

/// KMS keepalive ping 주기 (KMS 기본 세션 타임아웃보다 짧게)
pub const KMS_PING_INTERVAL_MS: u64 = 240_000;

/// KMS 에러 코드: 대상 객체 없음 (이미 release 된 객체)
pub const KMS_OBJECT_NOT_FOUND: i64 = 40101;

// ----------------------------------------------------------------------------
// 세션 리포트 (Safari 진단용)
// ----------------------------------------------------------------------------

/// 리포트 파일 기본 저장 디렉토리
pub const DEFAULT_REPORT_DIR: &str = ".";

/// 리포트 파일명 접두어 — report_<reportId>.log
pub const REPORT_FILE_PREFIX: &str = "report_";

/// 리포트 파일 확장자
pub const REPORT_FILE_EXT: &str = "log";

/// reportId 최대 길이 (파일명으로 쓰이므로 제한)
pub const MAX_REPORT_ID_LEN: usize = 64;
