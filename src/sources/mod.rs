pub mod invidious;
pub mod search_client;
pub mod youtube_api_v3;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::scoring::Candidate;

pub use invidious::InvidiousClient;
pub use search_client::SearchClient;
pub use youtube_api_v3::{parse_duration_ms, YouTubeApiV3};

/// Número de candidatos pedidos a la API primaria.
pub const MAX_RESULTS: usize = 5;

/// Acceso HTTP a la API primaria (búsqueda + detalles).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Ids de video, en el orden de relevancia del proveedor.
    async fn search_ids(&self, query: &str, api_key: &str) -> Result<Vec<String>, SearchError>;

    /// Detalles completos (duración, título, canal, miniatura) de los ids dados.
    async fn video_details(
        &self,
        ids: &[String],
        api_key: &str,
    ) -> Result<Vec<Candidate>, SearchError>;

    fn source_name(&self) -> &'static str;
}

/// Acceso HTTP a una instancia espejo sin cuota.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorApi: Send + Sync {
    /// Busca en una instancia espejo; las duraciones ya vienen en ms.
    async fn search(&self, instance: &str, query: &str) -> Result<Vec<Candidate>, SearchError>;

    fn source_name(&self) -> &'static str;
}

/// Texto de búsqueda enviado a cualquier proveedor.
pub fn build_query(track_name: &str, artist_name: &str) -> String {
    format!("{} - {} official audio", artist_name, track_name)
}
