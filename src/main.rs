use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use track_resolver::cache::CacheStore;
use track_resolver::key_pool::KeyPool;
use track_resolver::pacing::IntervalPacer;
use track_resolver::sources::{InvidiousClient, SearchClient, YouTubeApiV3};
use track_resolver::storage::{DurableStore, JsonFileStore, MemoryStore};
use track_resolver::{BatchPipeline, Config, Resolver, TrackQuery};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging (a stderr: stdout lleva el JSON)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("track_resolver=debug".parse()?),
        )
        .init();

    info!("🎵 Iniciando track-resolver v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    if config.api_keys.is_empty() && config.mirror_instances.is_empty() {
        warn!("⚠️ Sin claves de API ni espejos: solo se encontrarán pistas en caché");
    }

    let queries = read_queries(std::env::args().nth(1)).await?;

    let durable: Arc<dyn DurableStore> = match JsonFileStore::new(config.cache_dir.clone()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("⚠️ Directorio de caché inutilizable ({}), los resultados no se guardarán", e);
            Arc::new(MemoryStore::new())
        }
    };
    let cache = Arc::new(CacheStore::new(durable, config.cache_lookup));
    let keys = Arc::new(KeyPool::new(config.api_keys.clone()));
    let search = SearchClient::new(
        Arc::new(YouTubeApiV3::new(config.http_timeout)?),
        Arc::new(InvidiousClient::new(config.mirror_timeout)?),
        config.mirror_instances.clone(),
    );
    let resolver = Arc::new(Resolver::new(cache.clone(), keys, search));
    let pipeline = BatchPipeline::new(
        resolver,
        Arc::new(IntervalPacer::new(config.batch_delay)),
        config.throttle_mode,
    );

    // Ctrl+C detiene el lote sin perder lo ya resuelto
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ Señal de apagado recibida, deteniendo tras la pista actual...");
            on_signal.cancel();
        }
    });

    let report = pipeline
        .resolve_all_until(
            queries,
            Some(|current: usize, total: usize| info!("⏳ Resolviendo {}/{}", current, total)),
            &cancel,
        )
        .await;

    let stats = cache.stats();
    info!(
        "📊 {}/{} encontradas, tasa de aciertos de caché {:.0}% ({} entradas nuevas)",
        report.matched_count(),
        report.tracks.len(),
        stats.hit_rate() * 100.0,
        stats.writes
    );

    println!("{}", serde_json::to_string_pretty(&report.tracks)?);
    Ok(())
}

/// Lee un array JSON de pistas desde `path`, o desde stdin si no se indica.
async fn read_queries(path: Option<String>) -> Result<Vec<TrackQuery>> {
    let content = match path.as_deref() {
        Some("-") | None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("no se pudieron leer las pistas de stdin")?;
            buf
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("no se pudo leer {}", path))?,
    };

    serde_json::from_str(&content).context("se esperaba un array JSON de {name, artist, durationMs}")
}
