mod batch;
mod client;
mod extract;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use batch::BatchRunner;
use client::ElevenLabsClient;

#[derive(Parser, Debug)]
#[command(
    name = "sfxgen",
    about = "Batch-generate sound effects from a markdown prompt sheet via ElevenLabs"
)]
struct Args {
    /// Test the API connection instead of running the batch
    #[arg(long)]
    test: bool,

    /// Output directory for audio files and the run log
    #[arg(long, default_value = "./assets/audio")]
    output: PathBuf,

    /// Delay between requests, in seconds
    #[arg(long, default_value_t = 1.5)]
    delay: f64,

    /// Markdown file containing the fenced JSON prompt definitions
    #[arg(long, default_value = "docs/design-system/elevenlabs-sfx-prompts.md")]
    prompts: PathBuf,

    /// API key; falls back to the ELEVENLABS_API_KEY environment variable
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n✗ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let client = ElevenLabsClient::new(args.api_key.as_deref())?;

    if args.test {
        return batch::probe(&client).await;
    }

    println!("\n{}", "=".repeat(60));
    println!("ElevenLabs SFX Batch Generator");
    println!("{}", "=".repeat(60));

    if !args.prompts.exists() {
        anyhow::bail!("Could not find prompts file: {}", args.prompts.display());
    }
    println!("\n✓ Found prompts file: {}", args.prompts.display());

    let content = std::fs::read_to_string(&args.prompts)
        .with_context(|| format!("Failed to read {}", args.prompts.display()))?;

    println!("\nExtracting SFX definitions from markdown...");
    let requests = extract::extract_sfx_blocks(&content);
    println!("\n✓ Extracted {} SFX definitions", requests.len());

    println!("\nReady to generate {} sound effects", requests.len());
    println!("Output directory: {}", args.output.display());
    println!("Rate limit delay: {}s between requests", args.delay);
    println!("\n▶ Starting batch generation...");

    let mut runner = BatchRunner::new(
        Box::new(client),
        args.output,
        Duration::from_secs_f64(args.delay),
    );
    runner.run(&requests).await?;

    Ok(())
}
