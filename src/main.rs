use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reservation_core::config::{parse_secs, PipelineConfig};
use reservation_core::protocol::Handler;
use reservation_core::{HttpProvider, Pipeline, RequestClient};

#[derive(Debug, Parser)]
#[command(name = "reservation-core", version, about = "Turn customer records into structured reservations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Items dispatched concurrently per batch.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Seconds to wait between batches.
    #[arg(long, global = true)]
    batch_delay: Option<String>,

    /// Attempts per request before giving up.
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// `openai`, `deepseek` or `custom`.
    #[arg(long, global = true)]
    provider: Option<String>,

    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL for the `custom` provider.
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process a customer file and write the report.
    Process {
        #[arg(long, default_value = "data/sample_reservations.json")]
        input: PathBuf,

        #[arg(long, default_value = "data/processed_output.json")]
        output: PathBuf,
    },
    /// Answer JSON-line requests on stdin.
    Serve,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) -> anyhow::Result<()> {
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(secs) = &self.batch_delay {
            config.batch_delay = parse_secs("--batch-delay", secs)?;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(p) = &self.provider {
            config.provider.provider = p.trim().to_lowercase();
        }
        if let Some(m) = &self.model {
            config.provider.model = m.trim().to_string();
        }
        if let Some(url) = &self.base_url {
            config.provider.base_url = Some(url.trim().to_string());
        }
        Ok(())
    }
}

fn init_tracing() {
    // stdout carries protocol responses; logs go to stderr.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reservation_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_pipeline(config: &PipelineConfig) -> anyhow::Result<Pipeline> {
    let provider = HttpProvider::new(&config.provider).context("failed to configure provider")?;
    let client = RequestClient::from_config(Arc::new(provider), config);
    Ok(Pipeline::new(client, config))
}

async fn serve(handler: Handler) -> anyhow::Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = handler.handle_line(&line).await;

        if stdout.write_all(format!("{response}\n").as_bytes()).await.is_err() {
            warn!("stdout closed, stopping");
            break;
        }
        let _ = stdout.flush().await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env()?;
    cli.apply(&mut config)?;
    config.validate()?;

    info!(
        provider = %config.provider.provider,
        model = %config.provider.model,
        batch_size = config.batch_size,
        batch_delay_secs = config.batch_delay.as_secs_f64(),
        max_retries = config.max_retries,
        "starting reservation-core v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pipeline = build_pipeline(&config)?;

    match cli.command {
        Commands::Process { input, output } => {
            let report = pipeline
                .run_file(&input, &output)
                .await
                .with_context(|| format!("processing {} failed", input.display()))?;

            info!(
                total = report.metadata.total_processed,
                successful = report.metadata.successful,
                failed = report.metadata.failed,
                output = %output.display(),
                "processing pipeline complete"
            );
        }
        Commands::Serve => serve(Handler::new(pipeline)).await?,
    }

    Ok(())
}
