//! # Módulo de Caché
//!
//! Caché de dos niveles para pistas resueltas.
//!
//! - **Nivel efímero**: [`EphemeralCache`] local al proceso, se llena con los
//!   aciertos duraderos y las resoluciones nuevas. Nunca es la fuente de verdad.
//! - **Nivel duradero**: cualquier [`DurableStore`], compartido entre procesos
//!   y sesiones. Solo crece, sin desalojo.
//!
//! Las lecturas pasan por ambos niveles (efímero, duradero, y se rellena el
//! efímero) y las escrituras van a los dos. Una inserción duplicada en el nivel
//! duradero es una carrera esperada y cuenta como éxito. Cualquier otro fallo
//! duradero deja la caché solo en memoria hasta que termine el proceso.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use track_resolver::cache::{CacheStore, LookupMode};
//! use track_resolver::models::{MatchResult, TrackQuery};
//! use track_resolver::storage::MemoryStore;
//!
//! # async fn example() {
//! let cache = CacheStore::new(Arc::new(MemoryStore::new()), LookupMode::Exact);
//! let query = TrackQuery::new("Track", "Artist", 200_000);
//! let result = MatchResult {
//!     video_id: "abc123".to_string(),
//!     title: "Artist - Track".to_string(),
//!     duration_ms: 200_000,
//!     thumbnail_url: None,
//!     channel_title: None,
//! };
//! cache.store(&query, &result).await;
//! assert!(cache.lookup(&query.cache_key()).await.is_some());
//! # }
//! ```

pub mod ephemeral;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub use ephemeral::EphemeralCache;

use crate::error::CacheError;
use crate::models::{CacheKey, MatchResult, TrackQuery};
use crate::storage::{CachedRecord, DurableStore};

/// Cómo se compara la clave contra el nivel duradero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupMode {
    /// Igualdad sin distinguir mayúsculas sobre `(artist, name)`.
    #[default]
    Exact,
    /// Modo relajado opcional: basta con que el registro contenga artista y nombre.
    /// Puede dar falsos positivos ("Love" acierta con "I Love You").
    Substring,
}

impl FromStr for LookupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(LookupMode::Exact),
            "substring" => Ok(LookupMode::Substring),
            other => Err(format!("modo de búsqueda de caché desconocido: {}", other)),
        }
    }
}

/// Contadores de aciertos/fallos de la caché.
#[derive(Debug, Default)]
struct CacheCounters {
    ephemeral_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    duplicates: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub ephemeral_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub duplicates: u64,
    pub ephemeral_entries: usize,
    pub durable_available: bool,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.ephemeral_hits + self.durable_hits;
        if hits + self.misses == 0 {
            0.0
        } else {
            hits as f64 / (hits + self.misses) as f64
        }
    }
}

pub struct CacheStore {
    ephemeral: EphemeralCache<CacheKey, MatchResult>,
    durable: Arc<dyn DurableStore>,
    durable_available: AtomicBool,
    mode: LookupMode,
    counters: CacheCounters,
}

impl CacheStore {
    pub fn new(durable: Arc<dyn DurableStore>, mode: LookupMode) -> Self {
        Self {
            ephemeral: EphemeralCache::new(),
            durable,
            durable_available: AtomicBool::new(true),
            mode,
            counters: CacheCounters::default(),
        }
    }

    pub fn is_durable_available(&self) -> bool {
        self.durable_available.load(Ordering::SeqCst)
    }

    /// Busca un resultado: primero en memoria, luego en el nivel duradero.
    pub async fn lookup(&self, key: &CacheKey) -> Option<MatchResult> {
        if let Some(hit) = self.ephemeral.get(key) {
            self.counters.ephemeral_hits.fetch_add(1, Ordering::Relaxed);
            debug!("✅ Cache hit efímero para '{}'", key);
            return Some(hit);
        }

        if !self.is_durable_available() {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let found = match self.mode {
            LookupMode::Exact => self.durable.find(key).await,
            LookupMode::Substring => self.durable.find_loose(key).await,
        };

        match found {
            Ok(Some(record)) => {
                let result = record.to_match();
                self.ephemeral.insert_if_absent(key.clone(), result.clone());
                self.counters.durable_hits.fetch_add(1, Ordering::Relaxed);
                debug!("✅ Cache hit duradero para '{}'", key);
                Some(result)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!("❌ Cache miss para '{}'", key);
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.degrade(&e);
                None
            }
        }
    }

    /// Guarda un resultado en ambos niveles.
    pub async fn store(&self, query: &TrackQuery, result: &MatchResult) {
        let key = query.cache_key();
        self.ephemeral.insert_if_absent(key.clone(), result.clone());

        if !self.is_durable_available() {
            return;
        }

        match self.durable.insert(&CachedRecord::new(query, result)).await {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(CacheError::Duplicate(_)) => {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                debug!("La entrada '{}' ya estaba en caché", key);
            }
            Err(e) => self.degrade(&e),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            ephemeral_hits: self.counters.ephemeral_hits.load(Ordering::Relaxed),
            durable_hits: self.counters.durable_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            ephemeral_entries: self.ephemeral.len(),
            durable_available: self.is_durable_available(),
        }
    }

    fn degrade(&self, err: &CacheError) {
        if self.durable_available.swap(false, Ordering::SeqCst) {
            warn!("⚠️ Caché duradera no disponible, se continúa solo en memoria: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    fn result(video_id: &str) -> MatchResult {
        MatchResult {
            video_id: video_id.to_string(),
            title: "Artist - Track (Official Audio)".to_string(),
            duration_ms: 200_000,
            thumbnail_url: None,
            channel_title: Some("Artist".to_string()),
        }
    }

    /// Nivel duradero que siempre falla y cuenta las llamadas.
    #[derive(Default)]
    struct BrokenStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn find(&self, _key: &CacheKey) -> Result<Option<CachedRecord>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn find_loose(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError> {
            self.find(key).await
        }

        async fn insert(&self, _record: &CachedRecord) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let cache = CacheStore::new(Arc::new(MemoryStore::new()), LookupMode::Exact);
        cache
            .store(&TrackQuery::new("Track", "Artist", 200_000), &result("vid"))
            .await;

        let hit = cache.lookup(&CacheKey::new("artist", "track")).await;
        assert_eq!(hit.map(|r| r.video_id), Some("vid".to_string()));
    }

    #[tokio::test]
    async fn durable_hit_populates_ephemeral_tier() {
        let durable = Arc::new(MemoryStore::new());
        let query = TrackQuery::new("Track", "Artist", 200_000);
        durable
            .insert(&CachedRecord::new(&query, &result("vid")))
            .await
            .unwrap();

        let cache = CacheStore::new(durable, LookupMode::Exact);
        assert!(cache.lookup(&query.cache_key()).await.is_some());
        assert!(cache.lookup(&query.cache_key()).await.is_some());

        let stats = cache.stats();
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.ephemeral_hits, 1);
        assert_eq!(stats.ephemeral_entries, 1);
    }

    #[tokio::test]
    async fn storing_twice_is_idempotent() {
        let durable = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(durable.clone(), LookupMode::Exact);
        let query = TrackQuery::new("Track", "Artist", 200_000);

        cache.store(&query, &result("vid")).await;
        cache.store(&query, &result("vid")).await;

        assert_eq!(durable.len(), 1);
        let stats = cache.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.duplicates, 1);
        assert!(stats.durable_available);
    }

    #[tokio::test]
    async fn exact_mode_does_not_match_substrings() {
        let durable = Arc::new(MemoryStore::new());
        let stored = TrackQuery::new("I Love You", "Artist", 200_000);
        durable
            .insert(&CachedRecord::new(&stored, &result("vid")))
            .await
            .unwrap();

        let exact = CacheStore::new(durable.clone(), LookupMode::Exact);
        assert!(exact.lookup(&CacheKey::new("artist", "love")).await.is_none());

        let loose = CacheStore::new(durable, LookupMode::Substring);
        assert!(loose.lookup(&CacheKey::new("artist", "love")).await.is_some());
    }

    #[tokio::test]
    async fn durable_failure_degrades_to_ephemeral_only() {
        let broken = Arc::new(BrokenStore::default());
        let cache = CacheStore::new(broken.clone(), LookupMode::Exact);
        let query = TrackQuery::new("Track", "Artist", 200_000);

        assert!(cache.lookup(&query.cache_key()).await.is_none());
        assert!(!cache.is_durable_available());

        cache.store(&query, &result("vid")).await;
        assert_eq!(
            cache.lookup(&query.cache_key()).await.map(|r| r.video_id),
            Some("vid".to_string())
        );
        // Solo la primera búsqueda llegó al nivel roto.
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lookup_mode_parses() {
        assert_eq!("exact".parse::<LookupMode>(), Ok(LookupMode::Exact));
        assert_eq!(" Substring ".parse::<LookupMode>(), Ok(LookupMode::Substring));
        assert!("fuzzy".parse::<LookupMode>().is_err());
    }
}
