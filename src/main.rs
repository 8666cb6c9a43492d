//! CLI entry point for the imgdetect tool.

use std::io::{self, IsTerminal, Read};

use anyhow::{Context, Result, bail};
use clap::Parser;
use imgdetect_core::config::{load_file_config, resolve_default_config_path};
use imgdetect_core::{DetectorConfig, DetectorRegistry, ImageDetector, ImageRecord, ImgurDetector};
use tracing::{debug, info, warn};
use url::Url;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout carries only detected images.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let inputs = read_inputs(&args)?;
    if inputs.is_empty() {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://imgur.com/a/lDRB2' | imgdetect");
        return Ok(());
    }

    let config = load_config(&args)?;
    let detector = ImgurDetector::connect(&config).await?;
    if detector.state().is_degraded() {
        warn!(
            service = detector.service_name(),
            state = %detector.state(),
            "Detector is not healthy; detection will fail until it recovers"
        );
    }

    let mut registry = DetectorRegistry::new();
    registry.register(Box::new(detector));

    let total = inputs.len();
    let mut failed = 0usize;
    for input in &inputs {
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(error) => {
                warn!(input = %input, error = %error, "Skipping unparsable URL");
                failed += 1;
                continue;
            }
        };

        match registry.detect_images(&url).await {
            Ok(images) => {
                if images.is_empty() {
                    info!(url = %url, "No images found");
                }
                for image in &images {
                    print_record(image, args.json)?;
                }
            }
            Err(error) => {
                warn!(url = %url, error = %error, "Detection failed");
                failed += 1;
                // Lets a recovered service be used for the remaining inputs.
                if error.state().is_some() {
                    registry.refresh_states().await;
                }
            }
        }
    }

    info!(total, failed, "Detection complete");
    if failed > 0 {
        bail!("{failed} of {total} URL(s) could not be resolved");
    }
    Ok(())
}

fn read_inputs(args: &Args) -> Result<Vec<String>> {
    let raw = if !args.urls.is_empty() {
        args.urls.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        buffer
    } else {
        String::new()
    };

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn load_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = DetectorConfig::default();

    let path = args.config.clone().or_else(resolve_default_config_path);
    if let Some(path) = path {
        // An explicit --config must exist; the default location is optional.
        if args.config.is_some() || path.exists() {
            let file = load_file_config(&path)?;
            config.merge_file(&file);
            debug!(path = %path.display(), "Loaded config file");
        }
    }

    config.apply_env();
    if let Some(client_id) = &args.client_id {
        config.client_id.clone_from(client_id);
    }
    if let Some(secs) = args.timeout_secs {
        config.read_timeout_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

fn print_record(record: &ImageRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
    } else {
        println!("{record}");
    }
    Ok(())
}
