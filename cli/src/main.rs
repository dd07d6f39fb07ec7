mod client;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use common::{CrawlRequest, Job, JobStatus};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use client::Client;

#[derive(Parser)]
#[command(author, version, about = "Client for the sfcrawl daemon", long_about = None)]
struct Cli {
    /// Base URL of the daemon
    #[arg(long, global = true, env = "SFCRAWL_URL", default_value = common::DEFAULT_SERVER_URL)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a crawl
    Crawl {
        /// Site to crawl
        url: String,
        /// Stored .seospider configuration to use
        #[arg(long, default_value = common::DEFAULT_CONFIG_FILE)]
        config_file: String,
        /// Export format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,
        /// Export type, e.g. all_links or internal_all
        #[arg(long = "type", default_value = "all_links")]
        export_type: String,
        /// Poll until the crawl finishes
        #[arg(short, long)]
        wait: bool,
        /// Poll interval for --wait (e.g. "5s", "1m")
        #[arg(long, default_value = "5s")]
        interval: String,
    },
    /// Show the status of a crawl
    Status {
        id: String,
    },
    /// Download the export of a completed crawl
    Results {
        id: String,
        /// Write to this file instead of the server-suggested name ("-" for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage .seospider configurations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Upload a configuration file
    Upload {
        file: PathBuf,
    },
    /// List stored configurations
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = Client::new(&cli.server);

    match cli.command {
        Commands::Crawl { url, config_file, format, export_type, wait, interval } => {
            let request = CrawlRequest {
                url,
                config_file,
                export_format: format,
                export_type,
            };
            let mut job = client.start_crawl(&request).await?;
            println!("Crawl {} started", job.crawl_id);

            if wait {
                let every = poll_interval(&interval)?;
                while !job.status.is_terminal() {
                    tokio::time::sleep(every).await;
                    job = client.status(&job.crawl_id.0).await?;
                }
            }
            print_job(&job);
            if job.status == JobStatus::Failed {
                return Err(anyhow!("Crawl {} failed", job.crawl_id));
            }
        }
        Commands::Status { id } => {
            let job = client.status(&id).await?;
            print_job(&job);
        }
        Commands::Results { id, output } => {
            download(&client, &id, output).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Upload { file } => {
                let resp = client.upload_config(&file).await?;
                println!("{}", resp.message);
            }
            ConfigCommands::List => {
                let list = client.list_configs().await?;
                if list.config_files.is_empty() {
                    println!("No configuration files uploaded.");
                }
                for name in list.config_files {
                    println!("{}", name);
                }
            }
        },
    }

    Ok(())
}

async fn download(client: &Client, id: &str, output: Option<PathBuf>) -> Result<()> {
    let mut resp = client.results(id).await?;

    if output.as_deref() == Some(std::path::Path::new("-")) {
        let mut stdout = tokio::io::stdout();
        while let Some(chunk) = resp.chunk().await? {
            stdout.write_all(&chunk).await?;
        }
        stdout.flush().await?;
        return Ok(());
    }

    let target = match output {
        Some(path) => path,
        None => resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_name)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.export", id))),
    };

    let mut file = tokio::fs::File::create(&target).await?;
    let mut written = 0usize;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    println!("Saved {} bytes to {}", written, target.display());
    Ok(())
}

fn poll_interval(s: &str) -> Result<std::time::Duration> {
    let every = common::parse_duration(s)?;
    if every.is_zero() {
        return Err(anyhow!("--interval must be greater than zero"));
    }
    Ok(every)
}

/// File name from `attachment; filename="..."`, reduced to its last component.
fn attachment_name(header: &str) -> Option<String> {
    let raw = header.split("filename=").nth(1)?.trim().trim_matches('"');
    let name = std::path::Path::new(raw).file_name()?.to_str()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn print_job(job: &Job) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let status_color = match job.status {
        JobStatus::Running => Color::Yellow,
        JobStatus::Completed => Color::Green,
        JobStatus::Failed => Color::Red,
    };

    table.add_row(vec![Cell::new("Crawl ID"), Cell::new(&job.crawl_id)]);
    table.add_row(vec![Cell::new("Status"), Cell::new(job.status).fg(status_color)]);
    table.add_row(vec![Cell::new("URL"), Cell::new(&job.url)]);
    table.add_row(vec![Cell::new("Export"), Cell::new(format!("{} ({})", job.export_type, job.export_format))]);
    table.add_row(vec![Cell::new("Config"), Cell::new(&job.config_file)]);
    table.add_row(vec![Cell::new("Output"), Cell::new(&job.output_path)]);
    table.add_row(vec![Cell::new("Results ready"), Cell::new(job.results_ready)]);
    table.add_row(vec![
        Cell::new("Started"),
        Cell::new(job.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ]);
    if let Some(finished) = job.finished_at {
        let took = (finished - job.created_at).to_std().unwrap_or_default();
        table.add_row(vec![
            Cell::new("Finished"),
            Cell::new(format!(
                "{} ({})",
                finished.format("%Y-%m-%d %H:%M:%S UTC"),
                common::format_duration(took)
            )),
        ]);
    }
    if let Some(err) = &job.error_message {
        table.add_row(vec![Cell::new("Error"), Cell::new(err).fg(Color::Red)]);
    }

    println!("{table}");
}
