use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use deadwatch_infrastructure::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "deadwatch")]
#[command(about = "Game server status, kill feed and player stats pipeline", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The returned guard flushes the file writer when dropped.
fn init_tracing(config: &AppConfig) -> Option<WorkerGuard> {
    match config.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "deadwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let builder = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_writer(writer);
            if config.log_json {
                builder.json().init();
            } else {
                builder.init();
            }
            Some(guard)
        }
        None => {
            let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
            if config.log_json {
                builder.json().init();
            } else {
                builder.init();
            }
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_from(args.config.as_deref()).await?;
    let _guard = init_tracing(&config);
    info!(
        bind_addr = %config.bind_addr,
        state_path = %config.state_path,
        log_root = %config.log_root,
        "configuration loaded"
    );

    deadwatch_bootstrap::run_standalone(config).await
}
