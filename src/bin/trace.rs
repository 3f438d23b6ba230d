// author: kodeholic (powered by Claude)
//
// kstrace — mini-kurento-signal 실시간 시그널링 관찰 CLI
//
// 사용법:
//   kstrace [--host HOST] [--port PORT] [--filter KIND] [CONN_ID]
//
// 예시:
//   kstrace                      # 전체 이벤트 스트림
//   kstrace conn_3               # conn_3 연결만
//   kstrace --filter ice         # ICE 관련 이벤트만
//   kstrace conn_3 -f status     # conn_3 + STATUS 만

use clap::Parser;
use colored::Colorize;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::{BufRead, BufReader};

#[derive(Parser)]
#[command(name = "kstrace", about = "mini-kurento-signal 실시간 시그널링 이벤트 스트림 관찰", version)]
struct Cli {
    /// 서버 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 서버 포트
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// kind 필터 키워드 (대소문자 무관, 부분 일치)
    #[arg(long, short = 'f')]
    filter: Option<String>,

    /// 관찰할 연결 id (생략 시 전체)
    conn_id: Option<String>,
}

/// src/trace.rs TraceEvent 와 동일 구조
#[derive(Debug, Deserialize)]
struct TraceEvent {
    ts:      u64,
    dir:     String,   // "in" | "out" | "sys"
    conn_id: Option<String>,
    kind:    String,
    summary: String,
}

fn main() {
    let cli = Cli::parse();

    let url = match &cli.conn_id {
        Some(id) => format!("http://{}:{}/trace/{}", cli.host, cli.port, id),
        None     => format!("http://{}:{}/trace",    cli.host, cli.port),
    };
    let filter = cli.filter.as_ref().map(|s| s.to_lowercase());

    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {} {}  {}  {}",
        "kstrace".bold().cyan(),
        "▶".green(),
        url.dimmed(),
        filter.as_deref()
            .map(|f| format!("[filter: {}]", f).yellow().to_string())
            .unwrap_or_default(),
    );
    println!("{}", "─".repeat(90).dimmed());

    let client = match Client::builder().timeout(None).build() {
        Ok(c)  => c,
        Err(e) => {
            eprintln!("{} HTTP 클라이언트 생성 실패: {}", "✗".red(), e);
            std::process::exit(1);
        }
    };

    let resp = match client.get(&url).header("Accept", "text/event-stream").send() {
        Ok(r)  => r,
        Err(e) => {
            eprintln!("{} 서버 연결 실패: {}", "✗".red(), e);
            eprintln!("  서버가 실행 중인지 확인하세요: {}", url.dimmed());
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        eprintln!("{} HTTP {}", "✗".red(), resp.status());
        std::process::exit(1);
    }

    let mut event_count: u64 = 0;
    for line in BufReader::new(resp).lines() {
        let line = match line {
            Ok(l)  => l,
            Err(e) => {
                eprintln!("{} 스트림 읽기 실패: {}", "✗".red(), e);
                break;
            }
        };

        // SSE: "data: {JSON}" 외에는 keep-alive / 빈 줄
        let Some(json_str) = line.strip_prefix("data: ") else {
            continue;
        };

        let event: TraceEvent = match serde_json::from_str(json_str) {
            Ok(e)  => e,
            Err(e) => {
                eprintln!("{} JSON 파싱 실패: {} ({})", "⚠".yellow(), e, json_str);
                continue;
            }
        };

        if let Some(ref f) = filter {
            if !event.kind.to_lowercase().contains(f.as_str()) {
                continue;
            }
        }

        print_event(&event);
        event_count += 1;
    }

    println!("{}", "─".repeat(90).dimmed());
    println!("  스트림 종료 (총 {} 이벤트)", event_count);
}

fn print_event(e: &TraceEvent) {
    let dir_str = match e.dir.as_str() {
        "in"  => "↓ C→S".bright_blue().to_string(),
        "out" => "↑ S→C".bright_green().to_string(),
        "sys" => "· SYS".bright_yellow().to_string(),
        other => other.dimmed().to_string(),
    };

    println!(
        "  {} {} {:<12} {:<30} {}",
        format_ts(e.ts).dimmed(),
        dir_str,
        e.conn_id.as_deref().unwrap_or("-").bright_white(),
        colorize_kind(&e.kind),
        e.summary.dimmed(),
    );
}

fn colorize_kind(kind: &str) -> String {
    let upper = kind.to_uppercase();
    if upper.contains("ERROR") {
        kind.bright_red().bold().to_string()
    } else if upper.contains("ICE") {
        kind.bright_cyan().to_string()
    } else if upper.contains("FLOW") || upper.contains("STATUS") {
        kind.bright_green().to_string()
    } else if upper.contains("SESSION") || upper.contains("OFFER") || upper.contains("ANSWER") {
        kind.bright_magenta().to_string()
    } else {
        kind.normal().to_string()
    }
}

/// Unix millis → "HH:MM:SS.mmm" (UTC)
fn format_ts(ts_ms: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ts_ms as i64)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "--:--:--.---".to_string())
}
