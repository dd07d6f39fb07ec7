use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use sfcrawl_daemon::config::LoggingConfig;
use sfcrawl_daemon::{api, AppState, Config};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service configuration (.yaml, .yml or .toml)
    #[arg(short, long, env = "SFCRAWL_CONFIG")]
    config: Option<PathBuf>,
    /// Listen address, overrides server.listen_addr
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    setup_logging(&config.logging)?;
    log::info!("Starting sfcrawl-daemon {}...", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config)?;
    state.init_dirs().await?;

    // Provision the crawler license up front; jobs retry if this fails.
    if let Err(e) = state.license.ensure().await {
        log::error!("License provisioning failed at startup: {:#}", e);
    }

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    log::info!("Listening on {}", config.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("sfcrawl-daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn setup_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_file = std::env::var("SFCRAWL_LOG").ok().map(PathBuf::from).or_else(|| logging.output.clone());

    let base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d][%H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(logging.level_filter());

    // Main log: everything except captured crawler output
    let mut main_log = fern::Dispatch::new()
        .filter(|metadata| metadata.target() != "crawl_output")
        .chain(std::io::stdout());
    if let Some(path) = log_file {
        main_log = main_log.chain(fern::log_file(path)?);
    }

    let mut dispatch = base_config.chain(main_log);

    // Crawl output log: only the crawl_output target
    if let Some(path) = &logging.crawl_output {
        let crawl_log = fern::Dispatch::new()
            .filter(|metadata| metadata.target() == "crawl_output")
            .chain(fern::log_file(path)?);
        dispatch = dispatch.chain(crawl_log);
    }

    dispatch.apply()?;
    Ok(())
}
