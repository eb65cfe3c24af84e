use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::error::SearchError;
use crate::key_pool::KeyPool;
use crate::models::{MatchResult, ResolvedTrack, TrackQuery};
use crate::sources::SearchClient;

/// Por qué una pista quedó sin video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// El proveedor respondió pero ningún candidato puntuó sobre cero.
    NoCandidates,
    /// Fallo de red o HTTP; no se reintenta en la misma consulta.
    Transport,
    /// Todas las claves informaron cuota agotada para esta consulta.
    AllKeysExhausted,
    /// Sin claves configuradas ni espejos disponibles.
    NoProvider,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    CacheHit(MatchResult),
    Primary(MatchResult),
    Mirror(MatchResult),
    Unmatched(UnmatchedReason),
}

impl Resolution {
    pub fn result(&self) -> Option<&MatchResult> {
        match self {
            Resolution::CacheHit(m) | Resolution::Primary(m) | Resolution::Mirror(m) => Some(m),
            Resolution::Unmatched(_) => None,
        }
    }

    pub fn into_result(self) -> Option<MatchResult> {
        match self {
            Resolution::CacheHit(m) | Resolution::Primary(m) | Resolution::Mirror(m) => Some(m),
            Resolution::Unmatched(_) => None,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Resolution::CacheHit(_))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::CacheHit(m) => write!(f, "en caché ({})", m.video_id),
            Resolution::Primary(m) => write!(f, "encontrada ({})", m.video_id),
            Resolution::Mirror(m) => write!(f, "encontrada vía espejo ({})", m.video_id),
            Resolution::Unmatched(reason) => write!(f, "sin resultado ({:?})", reason),
        }
    }
}

/// Resultado de la fase de búsqueda primaria.
enum PrimaryOutcome {
    Found(MatchResult),
    Empty,
    Transport,
    Exhausted,
}

/// Orquesta caché → búsqueda primaria (con rotación de claves) → espejos.
pub struct Resolver {
    cache: Arc<CacheStore>,
    keys: Arc<KeyPool>,
    search: SearchClient,
}

impl Resolver {
    pub fn new(cache: Arc<CacheStore>, keys: Arc<KeyPool>, search: SearchClient) -> Self {
        Self {
            cache,
            keys,
            search,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn resolve(&self, query: &TrackQuery) -> Resolution {
        if let Some(hit) = self.lookup_cached(query).await {
            return Resolution::CacheHit(hit);
        }
        self.resolve_live(query).await
    }

    pub async fn resolve_track(&self, query: TrackQuery) -> ResolvedTrack {
        let resolution = self.resolve(&query).await;
        ResolvedTrack::from_result(query, resolution.into_result())
    }

    pub async fn lookup_cached(&self, query: &TrackQuery) -> Option<MatchResult> {
        self.cache.lookup(&query.cache_key()).await
    }

    /// Búsqueda en proveedores sin consultar la caché; guarda lo que encuentre.
    pub async fn resolve_live(&self, query: &TrackQuery) -> Resolution {
        let resolution = match self.search_primary(query).await {
            PrimaryOutcome::Found(m) => Resolution::Primary(m),
            PrimaryOutcome::Empty => Resolution::Unmatched(UnmatchedReason::NoCandidates),
            PrimaryOutcome::Transport => Resolution::Unmatched(UnmatchedReason::Transport),
            PrimaryOutcome::Exhausted => self.search_fallback(query).await,
        };

        if let Resolution::Primary(m) | Resolution::Mirror(m) = &resolution {
            self.cache.store(query, m).await;
        }

        debug!("'{} - {}': {}", query.artist, query.name, resolution);
        resolution
    }

    async fn search_primary(&self, query: &TrackQuery) -> PrimaryOutcome {
        // Cada clave tiene como mucho un intento por consulta.
        for attempt in 1..=self.keys.len() {
            let Some((slot, key)) = self.keys.current_slot() else {
                break;
            };

            match self
                .search
                .search(&query.name, &query.artist, query.duration_ms, key)
                .await
            {
                Ok(Some(m)) => return PrimaryOutcome::Found(m),
                Ok(None) => return PrimaryOutcome::Empty,
                Err(SearchError::QuotaExceeded(reason)) => {
                    warn!(
                        "⚠️ Cuota agotada en la posición {} (intento {}/{}): {}",
                        slot,
                        attempt,
                        self.keys.len(),
                        reason
                    );
                    if !self.keys.rotate_from(slot) {
                        break;
                    }
                }
                Err(SearchError::Transport(e)) => {
                    error!("❌ Falló la búsqueda de '{} - {}': {}", query.artist, query.name, e);
                    return PrimaryOutcome::Transport;
                }
            }
        }

        PrimaryOutcome::Exhausted
    }

    async fn search_fallback(&self, query: &TrackQuery) -> Resolution {
        let reason = if self.keys.is_empty() {
            UnmatchedReason::NoProvider
        } else {
            UnmatchedReason::AllKeysExhausted
        };

        if !self.search.has_mirrors() {
            if reason == UnmatchedReason::AllKeysExhausted {
                warn!("🚫 Todas las claves agotadas para '{} - {}'", query.artist, query.name);
            }
            return Resolution::Unmatched(reason);
        }

        info!("🔄 Recurriendo a espejos para '{} - {}'", query.artist, query.name);
        match self
            .search
            .search_mirrors(&query.name, &query.artist, query.duration_ms)
            .await
        {
            Some(m) => Resolution::Mirror(m),
            None => Resolution::Unmatched(reason),
        }
    }
}
