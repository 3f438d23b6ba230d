// author: kodeholic (powered by Claude)

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mini_kurento_signal::{config, run_server, ServerArgs};

/// ksserver — Kurento loopback 시그널링 서버
#[derive(Parser)]
#[command(name = "ksserver", about = "Kurento loopback signaling server", version)]
struct Cli {
    /// 시그널링 포트 (WS/HTTP 공용)
    #[arg(long, default_value_t = config::SIGNALING_PORT)]
    port: u16,

    /// KMS JSON-RPC 주소 (환경변수 KMS_URL 우선)
    #[arg(long, env = "KMS_URL", default_value = config::DEFAULT_KMS_URL)]
    kms_url: String,

    /// 진단 리포트 저장 디렉토리
    #[arg(long, default_value = config::DEFAULT_REPORT_DIR)]
    report_dir: PathBuf,

    /// KMS 호출 타임아웃 (ms)
    #[arg(long, default_value_t = config::ENGINE_CALL_TIMEOUT_MS)]
    call_timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    // RUST_LOG 우선, 없으면 info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    run_server(ServerArgs {
        port:            cli.port,
        kms_url:         cli.kms_url,
        report_dir:      cli.report_dir,
        call_timeout_ms: cli.call_timeout_ms,
    }).await;
}
