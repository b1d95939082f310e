use anyhow::{Context, Result};
use clap::Parser;
use lookup_common::observability::init_logging;
use lookup_config::{LookupConfig, LookupConfigLoader};
use lookup_web::{TextExtractor, WebPageTextExtractor};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Render a web page in headless Chrome and print its main text.
#[derive(Parser, Debug)]
#[command(name = "lookup", version, about)]
struct Args {
    /// Page to extract
    url: String,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum number of attempts
    #[arg(long)]
    attempts: Option<u32>,

    /// YAML config file (defaults to ./lookup.yaml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Env wins over the file.
    let loader = LookupConfigLoader::new();
    let loader = match &args.config {
        Some(path) => loader.with_file(path),
        None => loader.with_optional_file("lookup.yaml"),
    };
    let cfg: LookupConfig = loader.load().context("loading configuration")?;

    let mut logging = cfg.logging.clone();
    logging.stderr |= args.verbose;
    let log_path = init_logging("lookup", &logging)?;
    info!(log = %log_path.display(), version = ?cfg.version, "lookup starting");

    let extractor = WebPageTextExtractor::from_config(&cfg.extractor)?;
    extractor.initialize().await?;

    let result = extractor
        .extract(
            &args.url,
            args.timeout_ms.map(Duration::from_millis),
            args.attempts,
        )
        .await;
    extractor.dispose().await;

    match result {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(err) => {
            error!(url = %args.url, error = %err, "extraction failed");
            Err(err.into())
        }
    }
}
