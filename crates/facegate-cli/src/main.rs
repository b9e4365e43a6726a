use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "facegate", about = "facegate operator CLI")]
struct Cli {
    /// Base URL of the facegated daemon.
    #[arg(long, default_value = "http://127.0.0.1:5001")]
    daemon: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the person in a photo against the gallery
    Recognize {
        /// Path to the probe photo
        photo: PathBuf,
    },
    /// Rebuild the reference gallery from the asset library
    Refresh,
    /// Show daemon and gallery status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let http = reqwest::Client::new();

    match cli.command {
        Commands::Recognize { photo } => {
            let bytes = std::fs::read(&photo)
                .with_context(|| format!("reading {}", photo.display()))?;
            let body = serde_json::json!({ "image": STANDARD.encode(bytes) });
            let response = http
                .post(format!("{}/recognize-face", cli.daemon))
                .json(&body)
                .send()
                .await?;
            print_reply(response).await
        }
        Commands::Refresh => {
            let response = http
                .post(format!("{}/refresh-faces", cli.daemon))
                .send()
                .await?;
            print_reply(response).await
        }
        Commands::Status => {
            let response = http.get(format!("{}/status", cli.daemon)).send().await?;
            print_reply(response).await
        }
    }
}

async fn print_reply(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("daemon returned {status}");
    }
    Ok(())
}
