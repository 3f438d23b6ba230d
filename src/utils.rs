// author: kodeholic (powered by Gemini)

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// 현재 시간을 밀리초 단위의 Unix Timestamp로 반환합니다.
/// 에러 발생 시 시스템 패닉 대신 0(기본값)을 반환하여 장애를 방어합니다.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Unix millis → "YYYY-MM-DD@HH:MM:SS" (UTC)
pub fn format_wall_time(ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
        .map(|t| t.format("%Y-%m-%d@%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// 경과 millis → "HH:MM:SS" (24시간 초과 시 시간 자릿수 증가)
pub fn format_elapsed(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
