use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use research_tasks::Config;
use research_tasks_server::{ResearchServer, SimulatedResearcher};
use tracing_subscriber::EnvFilter;

/// Research task server: run long research jobs in the background over HTTP
#[derive(Parser, Debug)]
#[command(name = "research-tasks-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "RESEARCH_TASKS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of concurrent execution slots
    #[arg(long)]
    slots: Option<usize>,

    /// Directory research reports are written into
    #[arg(long)]
    reports_dir: Option<PathBuf>,

    /// Pause between simulated research iterations, in milliseconds
    #[arg(long, default_value_t = 500)]
    step_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(slots) = cli.slots {
        config.tasks.slots = slots;
    }
    if let Some(reports_dir) = cli.reports_dir {
        config.server.reports_dir = reports_dir;
    }
    config.validate()?;

    let researcher = SimulatedResearcher::new(&config.server.reports_dir)
        .with_step_delay(Duration::from_millis(cli.step_delay_ms));
    ResearchServer::start(config, researcher).await
}
