use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{VideoApi, MAX_RESULTS};
use crate::error::SearchError;
use crate::scoring::Candidate;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Categoría "Música" de YouTube.
const MUSIC_CATEGORY_ID: &str = "10";

const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("valid duration regex")
});

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetailsResponse {
    #[serde(default)]
    items: Vec<VideoDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    id: String,
    snippet: Option<VideoSnippet>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_title: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize, Clone)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

impl VideoDetails {
    /// `None` si al vídeo le falta el snippet o los detalles de contenido.
    fn into_candidate(self) -> Option<Candidate> {
        let (Some(snippet), Some(details)) = (self.snippet, self.content_details) else {
            debug!("Vídeo {} sin snippet o contentDetails, se descarta", self.id);
            return None;
        };

        Some(Candidate {
            duration_ms: parse_duration_ms(&details.duration),
            video_id: self.id,
            title: snippet.title,
            thumbnail_url: snippet.thumbnails.best_url(),
            channel_title: snippet.channel_title,
        })
    }
}

impl Thumbnails {
    fn best_url(self) -> Option<String> {
        self.high.or(self.medium).or(self.default).map(|t| t.url)
    }
}

/// Cliente de la YouTube Data API v3.
pub struct YouTubeApiV3 {
    client: reqwest::Client,
}

impl YouTubeApiV3 {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SearchError> {
        let response = self.client.get(url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SearchError::Transport(format!("respuesta inválida: {}", e)))
    }
}

#[async_trait]
impl VideoApi for YouTubeApiV3 {
    async fn search_ids(&self, query: &str, api_key: &str) -> Result<Vec<String>, SearchError> {
        debug!("🔍 Búsqueda YouTube API v3: {}", query);

        let max_results = MAX_RESULTS.to_string();
        let response: SearchResponse = self
            .get(
                SEARCH_URL,
                &[
                    ("part", "id"),
                    ("q", query),
                    ("type", "video"),
                    ("videoCategoryId", MUSIC_CATEGORY_ID),
                    ("maxResults", &max_results),
                    ("key", api_key),
                ],
            )
            .await?;

        let ids: Vec<String> = response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();

        debug!("YouTube API v3: {} id(s) candidato(s)", ids.len());
        Ok(ids)
    }

    async fn video_details(
        &self,
        ids: &[String],
        api_key: &str,
    ) -> Result<Vec<Candidate>, SearchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids.join(",");
        let response: VideoDetailsResponse = self
            .get(
                VIDEOS_URL,
                &[
                    ("part", "snippet,contentDetails"),
                    ("id", &joined),
                    ("key", api_key),
                ],
            )
            .await?;

        let candidates: Vec<Candidate> = response
            .items
            .into_iter()
            .filter_map(VideoDetails::into_candidate)
            .collect();

        info!("✅ YouTube API v3: {} candidato(s) con detalles", candidates.len());
        Ok(candidates)
    }

    fn source_name(&self) -> &'static str {
        "YouTube API v3"
    }
}

/// Clasifica una respuesta no 2xx como cuota agotada o fallo de transporte.
fn classify_failure(status: reqwest::StatusCode, body: &str) -> SearchError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("⚠️ YouTube API limitada por ritmo: {}", status);
        return SearchError::QuotaExceeded(status.to_string());
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        if let Some(reason) = quota_reason(body) {
            warn!("⚠️ Cuota de YouTube API agotada: {}", reason);
            return SearchError::QuotaExceeded(reason);
        }
    }

    error!("❌ Error de YouTube API: {} - {}", status, body);
    SearchError::Transport(format!("HTTP {}", status))
}

fn quota_reason(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope
        .error
        .errors
        .into_iter()
        .filter_map(|e| e.reason)
        .find(|reason| QUOTA_REASONS.contains(&reason.as_str()))
}

/// Parsea una duración ISO 8601 (`PT1H2M3S`) a milisegundos.
///
/// Cualquier texto fuera del subconjunto `PT[nH][nM][nS]` devuelve 0.
pub fn parse_duration_ms(duration: &str) -> u64 {
    let Some(caps) = ISO_DURATION.captures(duration) else {
        return 0;
    };

    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    (part(1) * 3600 + part(2) * 60 + part(3)) * 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_duration_ms("PT4M13S"), 253_000);
        assert_eq!(parse_duration_ms("PT1H"), 3_600_000);
        assert_eq!(parse_duration_ms("PT1H2M3S"), 3_723_000);
        assert_eq!(parse_duration_ms("PT45S"), 45_000);
    }

    #[test]
    fn malformed_durations_parse_to_zero() {
        assert_eq!(parse_duration_ms("PT"), 0);
        assert_eq!(parse_duration_ms(""), 0);
        assert_eq!(parse_duration_ms("4:13"), 0);
        assert_eq!(parse_duration_ms("P1DT2H"), 0);
    }

    #[test]
    fn quota_reasons_are_detected() {
        let body = r#"{"error":{"code":403,"errors":[{"reason":"quotaExceeded","domain":"youtube.quota"}]}}"#;
        let err = classify_failure(reqwest::StatusCode::FORBIDDEN, body);
        assert!(err.is_quota());

        let err = classify_failure(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(err.is_quota());
    }

    #[test]
    fn other_forbidden_errors_are_transport() {
        let body = r#"{"error":{"code":403,"errors":[{"reason":"forbidden"}]}}"#;
        let err = classify_failure(reqwest::StatusCode::FORBIDDEN, body);
        assert!(!err.is_quota());

        let err = classify_failure(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(!err.is_quota());
    }

    #[test]
    fn details_payload_maps_to_candidates() {
        let body = r#"{
            "items": [{
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "title": "Rick Astley - Never Gonna Give You Up (Official Music Video)",
                    "channelTitle": "Rick Astley",
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg"},
                        "medium": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"}
                    }
                },
                "contentDetails": {"duration": "PT3M33S"}
            }]
        }"#;
        let parsed: VideoDetailsResponse = serde_json::from_str(body).unwrap();
        let candidate = parsed.items.into_iter().next().unwrap().into_candidate().unwrap();
        assert_eq!(candidate.duration_ms, 213_000);
        assert_eq!(candidate.channel_title.as_deref(), Some("Rick Astley"));
        assert_eq!(
            candidate.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );
    }

    #[test]
    fn incomplete_items_are_skipped_not_fatal() {
        let body = r#"{
            "items": [
                {"id": "no-details", "snippet": {"title": "A - B"}},
                {"id": "no-snippet", "contentDetails": {"duration": "PT3M"}},
                {
                    "id": "complete",
                    "snippet": {"title": "A - B (Official Audio)"},
                    "contentDetails": {"duration": "PT3M20S"}
                }
            ]
        }"#;
        let parsed: VideoDetailsResponse = serde_json::from_str(body).unwrap();
        let candidates: Vec<Candidate> = parsed
            .items
            .into_iter()
            .filter_map(VideoDetails::into_candidate)
            .collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].video_id, "complete");
        assert_eq!(candidates[0].duration_ms, 200_000);
    }
}
