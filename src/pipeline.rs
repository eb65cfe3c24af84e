use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{ResolvedTrack, TrackQuery};
use crate::pacing::{Pacer, ThrottleMode};
use crate::resolver::{Resolution, Resolver};

/// Resultado de un lote: siempre tantas pistas como consultas, en orden.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub tracks: Vec<ResolvedTrack>,
    /// Consultas que llegaron al resolver antes de terminar el lote.
    pub processed: usize,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn matched_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.matched).count()
    }
}

/// Recorre una lista de consultas con el resolver, con ritmo y progreso.
pub struct BatchPipeline {
    resolver: Arc<Resolver>,
    pacer: Arc<dyn Pacer>,
    mode: ThrottleMode,
}

impl BatchPipeline {
    pub fn new(resolver: Arc<Resolver>, pacer: Arc<dyn Pacer>, mode: ThrottleMode) -> Self {
        Self {
            resolver,
            pacer,
            mode,
        }
    }

    /// Resuelve las consultas en orden. Un fallo en una pista la deja sin
    /// resultado; nada aquí aborta el lote.
    pub async fn resolve_all<F>(
        &self,
        queries: Vec<TrackQuery>,
        on_progress: Option<F>,
    ) -> Vec<ResolvedTrack>
    where
        F: FnMut(usize, usize),
    {
        self.resolve_all_until(queries, on_progress, &CancellationToken::new())
            .await
            .tracks
    }

    /// Como [`resolve_all`](Self::resolve_all), pero se detiene antes de la
    /// siguiente consulta cuando se dispara `cancel`. Las pendientes vuelven sin resultado.
    pub async fn resolve_all_until<F>(
        &self,
        queries: Vec<TrackQuery>,
        mut on_progress: Option<F>,
        cancel: &CancellationToken,
    ) -> BatchReport
    where
        F: FnMut(usize, usize),
    {
        let total = queries.len();
        let mut tracks = Vec::with_capacity(total);
        let mut processed = 0;
        let mut cancelled = false;

        info!("🎵 Resolviendo lote de {} pista(s) (ritmo {:?})", total, self.mode);

        for (index, query) in queries.into_iter().enumerate() {
            if cancelled || cancel.is_cancelled() {
                if !cancelled {
                    warn!("⚠️ Lote cancelado tras {}/{} pista(s)", processed, total);
                    cancelled = true;
                }
                tracks.push(ResolvedTrack::unmatched(query));
                continue;
            }

            if let Some(report) = on_progress.as_mut() {
                report(index + 1, total);
            }

            let resolution = self.resolve_one(&query).await;
            debug!("[{}/{}] '{} - {}': {}", index + 1, total, query.artist, query.name, resolution);

            tracks.push(ResolvedTrack::from_result(query, resolution.into_result()));
            processed += 1;
        }

        let report = BatchReport {
            tracks,
            processed,
            cancelled,
        };
        info!(
            "✅ Lote terminado: {}/{} encontradas{}",
            report.matched_count(),
            total,
            if cancelled { " (cancelado)" } else { "" }
        );
        report
    }

    async fn resolve_one(&self, query: &TrackQuery) -> Resolution {
        match self.mode {
            ThrottleMode::Uniform => {
                self.pacer.ready().await;
                self.resolver.resolve(query).await
            }
            ThrottleMode::LiveOnly => {
                if let Some(hit) = self.resolver.lookup_cached(query).await {
                    return Resolution::CacheHit(hit);
                }
                self.pacer.ready().await;
                self.resolver.resolve_live(query).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, LookupMode};
    use crate::error::SearchError;
    use crate::key_pool::KeyPool;
    use crate::pacing::{IntervalPacer, NoPacing};
    use crate::scoring::Candidate;
    use crate::sources::{MockMirrorApi, MockVideoApi, SearchClient};
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::Instant;

    /// API simulada que responde con un candidato bien puntuado con el nombre
    /// de la pista, salvo para "Nope", que no recibe nada.
    fn echo_api(calls: Arc<Mutex<Vec<(String, Instant)>>>) -> MockVideoApi {
        let mut api = MockVideoApi::new();
        api.expect_source_name().return_const("YouTube API v3");
        api.expect_search_ids().returning(move |query, _| {
            calls.lock().push((query.to_string(), Instant::now()));
            if query.contains("Nope") {
                return Ok(Vec::new());
            }
            let track = query
                .split(" - ")
                .nth(1)
                .unwrap_or_default()
                .replace(" official audio", "");
            Ok(vec![track])
        });
        api.expect_video_details().returning(|ids, _| {
            Ok(ids
                .iter()
                .map(|id| Candidate {
                    video_id: format!("vid-{}", id),
                    title: format!("Artist - {} (Official Audio)", id),
                    duration_ms: 200_000,
                    thumbnail_url: None,
                    channel_title: None,
                })
                .collect())
        });
        api
    }

    fn pipeline(api: MockVideoApi, pacer: Arc<dyn Pacer>, mode: ThrottleMode) -> BatchPipeline {
        let mut mirrors = MockMirrorApi::new();
        mirrors.expect_search().never();
        mirrors.expect_source_name().return_const("Invidious");

        let cache = Arc::new(CacheStore::new(Arc::new(MemoryStore::new()), LookupMode::Exact));
        let keys = Arc::new(KeyPool::new(vec!["key".to_string()]));
        let search = SearchClient::new(Arc::new(api), Arc::new(mirrors), Vec::new());
        BatchPipeline::new(Arc::new(Resolver::new(cache, keys, search)), pacer, mode)
    }

    fn q(name: &str) -> TrackQuery {
        TrackQuery::new(name, "Artist", 200_000)
    }

    #[tokio::test]
    async fn output_preserves_order_and_length() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(echo_api(calls), Arc::new(NoPacing), ThrottleMode::LiveOnly);

        let mut progress = Vec::new();
        let tracks = pipeline
            .resolve_all(
                vec![q("One"), q("Nope"), q("Three")],
                Some(|i: usize, n: usize| progress.push((i, n))),
            )
            .await;

        assert_eq!(tracks.len(), 3);
        assert!(tracks[0].matched);
        assert_eq!(tracks[0].video_id.as_deref(), Some("vid-One"));
        assert!(!tracks[1].matched);
        assert_eq!(tracks[1].video_id, None);
        assert!(tracks[2].matched);
        assert_eq!(tracks[2].name, "Three");
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn quota_failures_do_not_abort_the_batch() {
        let mut api = MockVideoApi::new();
        api.expect_source_name().return_const("YouTube API v3");
        api.expect_search_ids()
            .returning(|_, _| Err(SearchError::QuotaExceeded("quotaExceeded".into())));
        let pipeline = pipeline(api, Arc::new(NoPacing), ThrottleMode::LiveOnly);

        let tracks = pipeline
            .resolve_all(vec![q("One"), q("Two")], None::<fn(usize, usize)>)
            .await;
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| !t.matched));
    }

    #[tokio::test(start_paused = true)]
    async fn live_only_pacing_skips_cache_hits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pacer = Arc::new(IntervalPacer::new(Duration::from_millis(100)));
        let pipeline = pipeline(echo_api(calls.clone()), pacer, ThrottleMode::LiveOnly);
        let start = Instant::now();

        pipeline
            .resolve_all(vec![q("One"), q("One"), q("One"), q("Two")], None::<fn(usize, usize)>)
            .await;

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1 - start, Duration::ZERO);
        assert_eq!(calls[1].1 - start, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn uniform_pacing_delays_cache_hits_too() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pacer = Arc::new(IntervalPacer::new(Duration::from_millis(100)));
        let pipeline = pipeline(echo_api(calls.clone()), pacer, ThrottleMode::Uniform);
        let start = Instant::now();

        pipeline
            .resolve_all(vec![q("One"), q("One"), q("One"), q("Two")], None::<fn(usize, usize)>)
            .await;

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        // Los dos aciertos de caché intermedios también consumieron un turno.
        assert_eq!(calls[1].1 - start, Duration::from_millis(300));
    }

    #[tokio::test]
    async fn cancellation_keeps_produced_results() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline(echo_api(calls), Arc::new(NoPacing), ThrottleMode::LiveOnly);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let report = pipeline
            .resolve_all_until(
                vec![q("One"), q("Two"), q("Three")],
                Some(move |i: usize, _n: usize| {
                    if i == 2 {
                        trigger.cancel();
                    }
                }),
                &cancel,
            )
            .await;

        // La cancelación se ve antes de la tercera consulta.
        assert!(report.cancelled);
        assert_eq!(report.processed, 2);
        assert_eq!(report.tracks.len(), 3);
        assert!(report.tracks[0].matched);
        assert!(report.tracks[1].matched);
        assert!(!report.tracks[2].matched);
        assert_eq!(report.matched_count(), 2);
    }
}
