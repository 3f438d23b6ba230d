// author: kodeholic (powered by Claude)
//
// ksadmin — mini-kurento-signal 운영 관리 CLI
//
// 사용법:
//   ksadmin [--host HOST] [--port PORT] <COMMAND>
//
//   ksadmin status              서버 상태 요약 (uptime, 세션 수, KMS 주소)
//   ksadmin sessions            세션 전체 테이블
//   ksadmin sessions <conn_id>  세션 상세 (엔진 핸들, 리포트 경로, ICE/미디어 시각)
//   ksadmin stop <conn_id>      세션 강제 종료

use clap::{Parser, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};

use mini_kurento_signal::core::SessionPhase;
use mini_kurento_signal::http::{AdminSessionDetail, AdminSessionSummary, ServerStatus};
use mini_kurento_signal::utils::{format_elapsed, format_wall_time};

#[derive(Parser)]
#[command(name = "ksadmin", about = "mini-kurento-signal 운영 관리 CLI", version)]
struct Cli {
    /// 서버 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 서버 포트 (WS/HTTP 공용)
    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 서버 상태 요약
    Status,

    /// 세션 목록 또는 상세
    Sessions {
        /// conn_id 지정 시 상세 보기
        conn_id: Option<String>,
    },

    /// 세션 강제 종료
    Stop {
        conn_id: String,
    },
}

// 컬러 렌더링용 표시 타입
#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "CONN ID")]
    conn_id:   String,
    #[tabled(rename = "REPORT")]
    report_id: String,
    #[tabled(rename = "PHASE")]
    phase:     String,
    #[tabled(rename = "AGE")]
    age:       String,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli  = Cli::parse();
    let base = format!("http://{}:{}", cli.host, cli.port);

    let result = match &cli.command {
        Command::Status                        => cmd_status(&base),
        Command::Sessions { conn_id: None }    => cmd_sessions(&base),
        Command::Sessions { conn_id: Some(id) } => cmd_session_detail(&base, id),
        Command::Stop { conn_id }              => cmd_stop(&base, conn_id),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_status(base: &str) -> CliResult {
    let s: ServerStatus = get_json(&format!("{}/admin/status", base))?;

    println!();
    println!("{}", "  mini-kurento-signal Server Status".bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}", "Uptime:".bold(),   format_elapsed(s.uptime_secs * 1000).green());
    println!("  {:16} {}", "Sessions:".bold(), s.session_count.to_string().yellow());
    println!("  {:16} {}", "KMS:".bold(),      s.engine_url.dimmed());
    println!();
    Ok(())
}

fn cmd_sessions(base: &str) -> CliResult {
    let sessions: Vec<AdminSessionSummary> = get_json(&format!("{}/admin/sessions", base))?;

    if sessions.is_empty() {
        println!("{}", "  진행 중인 세션 없음".dimmed());
        return Ok(());
    }

    let rows: Vec<SessionRow> = sessions.iter().map(|s| SessionRow {
        conn_id:   s.conn_id.clone(),
        report_id: s.report_id.clone(),
        phase:     colorize_phase(s.phase),
        age:       format_elapsed(s.age_secs * 1000),
    }).collect();

    println!();
    println!("{}", Table::new(&rows));
    println!("  {} session(s)", rows.len());
    println!();
    Ok(())
}

fn cmd_session_detail(base: &str, conn_id: &str) -> CliResult {
    let s: AdminSessionDetail = get_json(&format!("{}/admin/sessions/{}", base, conn_id))?;

    let media_delay = match (s.ice_start_ms, s.media_flow_ms) {
        (Some(ice), Some(flow)) => format!("{}ms after ICE start", flow.saturating_sub(ice)),
        _                       => "-".to_string(),
    };

    println!();
    println!("{}", format!("  Session: {}", s.conn_id).bold().cyan());
    println!("  {}", "─".repeat(48).dimmed());
    println!("  {:16} {}", "Report:".bold(),     s.report_id.yellow());
    println!("  {:16} {}", "Phase:".bold(),      colorize_phase(s.phase));
    println!("  {:16} {}", "Created:".bold(),    format_wall_time(s.created_at));
    println!("  {:16} {}", "Age:".bold(),        format_elapsed(s.age_secs * 1000));
    println!("  {:16} {}", "Pipeline:".bold(),   s.pipeline_id.dimmed());
    println!("  {:16} {}", "Endpoint:".bold(),   s.endpoint_id.dimmed());
    println!("  {:16} {}", "Report File:".bold(), s.report_path);
    println!("  {:16} {}", "ICE Start:".bold(),  opt_time(s.ice_start_ms));
    println!("  {:16} {}", "Media Flow:".bold(), opt_time(s.media_flow_ms));
    println!("  {:16} {}", "Media Delay:".bold(), media_delay);
    println!();
    Ok(())
}

fn cmd_stop(base: &str, conn_id: &str) -> CliResult {
    let client = reqwest::blocking::Client::new();
    let resp   = client.post(format!("{}/admin/sessions/{}/stop", base, conn_id)).send()?;

    let status = resp.status();
    let body: serde_json::Value = resp.json()?;

    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }

    println!();
    println!("  {} conn={}", "Session Stopped".green().bold(), conn_id.yellow());
    println!();
    Ok(())
}

fn colorize_phase(phase: SessionPhase) -> String {
    match phase {
        SessionPhase::Active      => "active".green().to_string(),
        SessionPhase::Negotiating => "negotiating".yellow().to_string(),
        SessionPhase::Closed      => "closed".dimmed().to_string(),
    }
}

fn opt_time(ms: Option<u64>) -> String {
    ms.map(format_wall_time).unwrap_or_else(|| "-".to_string())
}

/// GET 요청 + JSON 역직렬화
fn get_json<T: for<'de> serde::Deserialize<'de>>(url: &str) -> Result<T, Box<dyn std::error::Error>> {
    let resp   = reqwest::blocking::get(url)?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }
    Ok(resp.json()?)
}
