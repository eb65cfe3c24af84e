use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::MirrorApi;
use crate::error::SearchError;
use crate::scoring::Candidate;

/// Cliente para la API de Invidious (espejos públicos de YouTube)
pub struct InvidiousClient {
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvidiousSearchResult {
    video_id: String,
    title: String,
    length_seconds: Option<u64>,
    author: Option<String>,
    video_thumbnails: Option<Vec<Thumbnail>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    #[serde(default)]
    width: u32,
}

impl InvidiousClient {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self { client, timeout })
    }
}

impl From<InvidiousSearchResult> for Candidate {
    fn from(result: InvidiousSearchResult) -> Self {
        let thumbnail_url = result
            .video_thumbnails
            .and_then(|thumbs| thumbs.into_iter().find(|t| t.width >= 320))
            .map(|t| t.url);

        Candidate {
            video_id: result.video_id,
            title: result.title,
            duration_ms: result.length_seconds.unwrap_or(0) * 1000,
            thumbnail_url,
            channel_title: result.author,
        }
    }
}

#[async_trait]
impl MirrorApi for InvidiousClient {
    async fn search(&self, instance: &str, query: &str) -> Result<Vec<Candidate>, SearchError> {
        let url = format!("{}/api/v1/search", instance.trim_end_matches('/'));
        debug!("🔍 Búsqueda Invidious en {}: {}", instance, query);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("type", "video")])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("❌ {} respondió {}", instance, response.status());
            return Err(SearchError::Transport(format!("HTTP {}", response.status())));
        }

        let results: Vec<InvidiousSearchResult> = response
            .json()
            .await
            .map_err(|e| SearchError::Transport(format!("respuesta de espejo inválida: {}", e)))?;

        Ok(results.into_iter().map(Candidate::from).collect())
    }

    fn source_name(&self) -> &'static str {
        "Invidious"
    }
}
