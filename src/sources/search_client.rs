use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{build_query, MirrorApi, VideoApi};
use crate::error::SearchError;
use crate::models::MatchResult;
use crate::scoring;

/// Búsqueda en dos pasos contra la API primaria, con espejos de respaldo.
pub struct SearchClient {
    api: Arc<dyn VideoApi>,
    mirrors: Arc<dyn MirrorApi>,
    instances: Vec<String>,
}

impl SearchClient {
    pub fn new(api: Arc<dyn VideoApi>, mirrors: Arc<dyn MirrorApi>, instances: Vec<String>) -> Self {
        Self {
            api,
            mirrors,
            instances,
        }
    }

    pub fn has_mirrors(&self) -> bool {
        !self.instances.is_empty()
    }

    /// Busca en el proveedor primario con una clave.
    ///
    /// `Ok(None)` significa que respondió pero ningún candidato puntuó sobre cero.
    pub async fn search(
        &self,
        track_name: &str,
        artist_name: &str,
        target_duration_ms: u64,
        api_key: &str,
    ) -> Result<Option<MatchResult>, SearchError> {
        let query = build_query(track_name, artist_name);

        let ids = self.api.search_ids(&query, api_key).await?;
        if ids.is_empty() {
            debug!("{} no devolvió ids para '{}'", self.api.source_name(), query);
            return Ok(None);
        }

        let candidates = self.api.video_details(&ids, api_key).await?;
        let best = scoring::score(&candidates, target_duration_ms, track_name, artist_name);

        match &best {
            Some(m) => info!("🎯 '{}' encontrada: {} ({})", query, m.video_id, m.title),
            None => debug!("Ninguno de {} candidatos superó la puntuación para '{}'", candidates.len(), query),
        }
        Ok(best)
    }

    /// Prueba cada espejo en orden hasta que uno dé un candidato válido.
    pub async fn search_mirrors(
        &self,
        track_name: &str,
        artist_name: &str,
        target_duration_ms: u64,
    ) -> Option<MatchResult> {
        let query = build_query(track_name, artist_name);

        for instance in &self.instances {
            match self.mirrors.search(instance, &query).await {
                Ok(candidates) if !candidates.is_empty() => {
                    if let Some(best) =
                        scoring::score(&candidates, target_duration_ms, track_name, artist_name)
                    {
                        info!("✅ Resultado de {} en {}: {}", self.mirrors.source_name(), instance, best.video_id);
                        return Some(best);
                    }
                    debug!("{}: ningún candidato superó la puntuación", instance);
                }
                Ok(_) => {
                    warn!("⚠️ {} devolvió 0 resultados", instance);
                }
                Err(e) => {
                    warn!("❌ Falló la búsqueda en el espejo {}: {}", instance, e);
                }
            }
        }

        None
    }
}
