use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::Serialize;

pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

// Balance of quality and file size.
const OUTPUT_FORMAT: &str = "mp3_44100_96";

pub type SfxStream = BoxStream<'static, Result<Bytes>>;

/// The remote sound-generation boundary. The batch runner only sees this
/// trait, so tests substitute a mock.
#[async_trait]
pub trait SfxClient: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        duration_seconds: Option<f64>,
        prompt_influence: f64,
    ) -> Result<SfxStream>;
}

#[derive(Serialize)]
struct SoundGenerationRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    prompt_influence: f64,
}

pub struct ElevenLabsClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    /// Builds a client from an explicit key, falling back to the
    /// `ELEVENLABS_API_KEY` environment variable.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key.to_string(),
            None => std::env::var(API_KEY_ENV)
                .with_context(|| format!("{} is not set and no --api-key was given", API_KEY_ENV))?,
        };
        Ok(Self::with_base_url(api_key, DEFAULT_BASE_URL))
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SfxClient for ElevenLabsClient {
    async fn generate(
        &self,
        text: &str,
        duration_seconds: Option<f64>,
        prompt_influence: f64,
    ) -> Result<SfxStream> {
        let url = format!(
            "{}/v1/sound-generation?output_format={}",
            self.base_url, OUTPUT_FORMAT
        );

        let body = SoundGenerationRequest {
            text,
            duration_seconds,
            prompt_influence,
        };

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("ElevenLabs API error ({}): {}", status, error_text));
        }

        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed())
    }
}
