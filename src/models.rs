use serde::{Deserialize, Serialize};
use std::fmt;

/// Pista de entrada: lo que el usuario conoce de la canción.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuery {
    pub name: String,
    pub artist: String,
    pub duration_ms: u64,
}

impl TrackQuery {
    pub fn new(name: impl Into<String>, artist: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            duration_ms,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.artist, &self.name)
    }
}

/// Clave normalizada `(artist, name)`.
///
/// Solo se ignoran las mayúsculas; espacios y puntuación se conservan, así que
/// `"Daft Punk"` y `"daft punk"` coinciden pero `"Daft  Punk"` no.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    artist: String,
    name: String,
}

impl CacheKey {
    pub fn new(artist: &str, name: &str) -> Self {
        Self {
            artist: artist.to_lowercase(),
            name: name.to_lowercase(),
        }
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coincidencia relajada del modo opcional por subcadena.
    pub fn loosely_matches(&self, artist: &str, name: &str) -> bool {
        let artist = artist.to_lowercase();
        let name = name.to_lowercase();
        artist.contains(&self.artist) && name.contains(&self.name)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)
    }
}

/// Video elegido para una pista. Inmutable una vez producido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub video_id: String,
    pub title: String,
    pub duration_ms: u64,
    pub thumbnail_url: Option<String>,
    pub channel_title: Option<String>,
}

impl MatchResult {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// La consulta original anotada con lo que encontró el resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTrack {
    pub name: String,
    pub artist: String,
    pub duration_ms: u64,
    pub video_id: Option<String>,
    pub video_title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub matched: bool,
}

impl ResolvedTrack {
    pub fn matched(query: TrackQuery, result: MatchResult) -> Self {
        Self {
            name: query.name,
            artist: query.artist,
            duration_ms: query.duration_ms,
            video_id: Some(result.video_id),
            video_title: Some(result.title),
            thumbnail_url: result.thumbnail_url,
            matched: true,
        }
    }

    pub fn unmatched(query: TrackQuery) -> Self {
        Self {
            name: query.name,
            artist: query.artist,
            duration_ms: query.duration_ms,
            video_id: None,
            video_title: None,
            thumbnail_url: None,
            matched: false,
        }
    }

    pub fn from_result(query: TrackQuery, result: Option<MatchResult>) -> Self {
        match result {
            Some(result) => Self::matched(query, result),
            None => Self::unmatched(query),
        }
    }
}
