use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::client::{SfxClient, SfxStream};
use crate::extract::SfxRequest;

pub const LOG_FILENAME: &str = "sfx_generation_log.json";

const PROBE_PROMPT: &str = "Quick button click sound, 8-bit retro game, simple beep";
const PROBE_DURATION: f64 = 0.5;
const PROBE_INFLUENCE: f64 = 0.7;
const PROBE_OUTPUT_PATH: &str = "./test_output/test_connection.mp3";

/// Outcome of one generation attempt. Appended to the run log in request
/// order, never mutated afterwards.
#[derive(Debug, Serialize)]
pub struct GenerationResult {
    #[serde(flatten)]
    pub request: SfxRequest,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct BatchRunner {
    client: Box<dyn SfxClient>,
    output_dir: PathBuf,
    delay: Duration,
    log: Vec<GenerationResult>,
}

impl BatchRunner {
    pub fn new(client: Box<dyn SfxClient>, output_dir: PathBuf, delay: Duration) -> Self {
        Self {
            client,
            output_dir,
            delay,
            log: Vec::new(),
        }
    }

    /// Runs the whole batch sequentially and flushes the log at the end.
    /// Returns (successful, total). One failed item never halts the run.
    pub async fn run(&mut self, requests: &[SfxRequest]) -> Result<(usize, usize)> {
        let total = requests.len();
        let mut successful = 0;

        println!("\n{}", "=".repeat(60));
        println!("Starting batch generation: {} SFX", total);
        println!("{}", "=".repeat(60));

        for (i, request) in requests.iter().enumerate() {
            println!("\n[{}/{}] {}", i + 1, total, "=".repeat(50));

            if self.generate_one(request).await {
                successful += 1;
            }

            // Rate limiting; no trailing delay after the last item.
            if i + 1 < total {
                tokio::time::sleep(self.delay).await;
            }
        }

        self.save_log().await?;

        println!("\n{}", "=".repeat(60));
        println!("Batch complete: {}/{} successful", successful, total);
        println!("{}", "=".repeat(60));

        Ok((successful, total))
    }

    async fn generate_one(&mut self, request: &SfxRequest) -> bool {
        println!("\n[{}] Generating...", request.id);
        let preview: String = request.prompt.chars().take(60).collect();
        println!("  Prompt: {}...", preview);
        match request.duration_seconds {
            Some(d) => println!("  Duration: {}s | Influence: {}", d, request.prompt_influence),
            None => println!("  Duration: auto | Influence: {}", request.prompt_influence),
        }

        match self.write_audio(request).await {
            Ok(output_path) => {
                println!("  ✓ Saved to {}", output_path);
                self.log.push(GenerationResult {
                    request: request.clone(),
                    success: true,
                    output_path: Some(output_path),
                    error: None,
                });
                true
            }
            Err(e) => {
                println!("  ✗ Error: {:#}", e);
                self.log.push(GenerationResult {
                    request: request.clone(),
                    success: false,
                    output_path: None,
                    error: Some(format!("{:#}", e)),
                });
                false
            }
        }
    }

    async fn write_audio(&self, request: &SfxRequest) -> Result<String> {
        let output_path = self.output_dir.join(&request.filename);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let stream = self
            .client
            .generate(
                &request.prompt,
                request.duration_seconds,
                request.prompt_influence,
            )
            .await?;

        // The file is only created once the remote call has succeeded.
        stream_to_file(stream, &output_path).await?;

        Ok(output_path.to_string_lossy().into_owned())
    }

    async fn save_log(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).await?;
        let log_path = self.output_dir.join(LOG_FILENAME);
        let content = serde_json::to_string_pretty(&self.log)?;
        fs::write(&log_path, content)
            .await
            .with_context(|| format!("Failed to write {}", log_path.display()))?;
        println!("\n✓ Log saved to {}", log_path.display());
        Ok(())
    }
}

async fn stream_to_file(mut stream: SfxStream, path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

/// One minimal generation call against a fixed test location. A pre-flight
/// check only; shares no state with batch generation.
pub async fn probe(client: &dyn SfxClient) -> Result<()> {
    probe_to(client, Path::new(PROBE_OUTPUT_PATH)).await
}

async fn probe_to(client: &dyn SfxClient, path: &Path) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("Testing ElevenLabs API connection...");
    println!("{}", "=".repeat(60));
    println!("\nTest parameters:");
    println!("  Prompt: {}", PROBE_PROMPT);
    println!("  Duration: {}s", PROBE_DURATION);
    println!("  Influence: {}", PROBE_INFLUENCE);
    println!("\nGenerating test sound effect...");

    let stream = client
        .generate(PROBE_PROMPT, Some(PROBE_DURATION), PROBE_INFLUENCE)
        .await
        .context("Connection failed")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    stream_to_file(stream, path).await.context("Connection failed")?;

    println!("\n✓ Connection successful!");
    println!("✓ Test file saved to: {}", path.display());
    println!("✓ API is ready for batch generation");
    Ok(())
}
