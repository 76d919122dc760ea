//! printlink hub command-line client.

mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use printlink_hub_control::{ControlError, EventCallback, FleetClient, UploadEvent, UploadRequest};
use printlink_protocol::Destination;
use printlink_services::{DiagnosisClient, DiagnosisRequest};
use printlink_transport::{WsConfig, WsTransport};

use crate::config::HubConfig;

#[derive(Parser, Debug)]
#[command(name = "printlink-hub", version, about = "Send files and commands to a printer fleet")]
struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Broker bridge URL, overriding the configuration.
    #[arg(long, value_name = "URL", global = true)]
    broker: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a G-code file to a printer.
    Upload {
        device: String,
        file: PathBuf,
        #[arg(long, default_value = "local")]
        destination: Destination,
        /// Start printing once the printer confirmed the upload.
        #[arg(long)]
        print: bool,
    },
    /// Start printing a file already on the printer.
    Print {
        device: String,
        filename: String,
        #[arg(long, default_value = "local")]
        origin: Destination,
    },
    Pause {
        device: String,
    },
    Resume {
        device: String,
    },
    Cancel {
        device: String,
    },
    /// Show the status of every printer heard from.
    Status {
        /// Keep printing changes until interrupted.
        #[arg(long)]
        watch: bool,
        /// How long to collect status messages before printing.
        #[arg(long, value_name = "SECS", default_value_t = 3)]
        wait: u64,
    },
    /// Ask the diagnosis service about a printer.
    Diagnose { device: String, prompt: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = HubConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(url) = cli.broker {
        config.broker_url = url;
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        name = %config.name,
        broker = %config.broker_url,
        "starting printlink hub"
    );

    let transport = Arc::new(WsTransport::new(config.broker_url.clone(), WsConfig::default()));
    let fleet = FleetClient::new(transport.clone(), config.fleet_options());
    fleet
        .start()
        .await
        .with_context(|| format!("connecting to {}", config.broker_url))?;

    let code = match cli.command {
        Command::Upload {
            device,
            file,
            destination,
            print,
        } => upload(&fleet, &device, &file, destination, print).await?,
        Command::Print {
            device,
            filename,
            origin,
        } => {
            let report = fleet.commands()?.start_print(&device, &filename, origin).await?;
            finish(output::command_summary(&report))
        }
        Command::Pause { device } => {
            finish(output::command_summary(&fleet.commands()?.pause(&device).await?))
        }
        Command::Resume { device } => {
            finish(output::command_summary(&fleet.commands()?.resume(&device).await?))
        }
        Command::Cancel { device } => {
            finish(output::command_summary(&fleet.commands()?.cancel(&device).await?))
        }
        Command::Status { watch, wait } => status(&fleet, watch, Duration::from_secs(wait)).await,
        Command::Diagnose { device, prompt } => diagnose(&fleet, &config, &device, prompt).await?,
    };

    fleet.shutdown().await;
    transport.close().await;
    Ok(code)
}

fn finish((line, code): (String, ExitCode)) -> ExitCode {
    println!("{line}");
    code
}

async fn upload(
    fleet: &FleetClient,
    device: &str,
    file: &std::path::Path,
    destination: Destination,
    print: bool,
) -> anyhow::Result<ExitCode> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", file.display()))?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let events: EventCallback = Arc::new(|event: &UploadEvent| println!("{}", output::event_line(event)));
    let session = fleet.upload_session()?.with_events(events);

    // Ctrl-C cancels between chunks or while awaiting the result.
    let cancel = session.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = session
        .run(UploadRequest::new(device, filename, destination, data))
        .await;
    interrupt.abort();

    let report = match result {
        Ok(report) => report,
        Err(ControlError::Cancelled) => {
            println!("upload cancelled");
            return Ok(ExitCode::from(130));
        }
        Err(e) => return Err(e.into()),
    };

    let succeeded = report.succeeded();
    let code = finish(output::upload_summary(&report));
    if !(succeeded && print) {
        return Ok(code);
    }

    let report = fleet
        .commands()?
        .start_print(device, filename, destination)
        .await?;
    Ok(finish(output::command_summary(&report)))
}

async fn status(fleet: &FleetClient, watch: bool, wait: Duration) -> ExitCode {
    let view = fleet.status();
    tokio::time::sleep(wait).await;

    let mut changes = view.subscribe_changes();
    for snapshot in view.snapshots() {
        println!("{}", output::snapshot_line(&snapshot));
    }
    println!("{}", output::summary_line(&view.summary()));

    if !watch {
        return ExitCode::SUCCESS;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(snapshot) => {
                    println!("{}", output::snapshot_line(&snapshot));
                    println!("{}", output::summary_line(&view.summary()));
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "status output lagging"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    ExitCode::SUCCESS
}

async fn diagnose(
    fleet: &FleetClient,
    config: &HubConfig,
    device: &str,
    prompt: String,
) -> anyhow::Result<ExitCode> {
    if config.diagnosis_url.is_empty() {
        bail!("diagnosis_url is not configured");
    }
    let client = DiagnosisClient::new(&config.diagnosis_url, &config.diagnosis_api_key)?;

    // Give the device one status interval to report in.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let status = match fleet.status().get(device) {
        Some(snapshot) => Some(serde_json::to_value(snapshot)?),
        None => {
            tracing::warn!(device = %device, "no status heard, diagnosing without it");
            None
        }
    };

    let diagnosis = client
        .diagnose(&DiagnosisRequest {
            device_id: device.to_string(),
            prompt,
            status,
        })
        .await?;

    println!("{}", diagnosis.summary);
    for suggestion in &diagnosis.suggestions {
        println!("  - {suggestion}");
    }
    Ok(ExitCode::SUCCESS)
}
