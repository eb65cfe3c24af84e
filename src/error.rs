use thiserror::Error;

/// Fallos de un proveedor de búsqueda (API primaria o espejo).
#[derive(Debug, Error)]
pub enum SearchError {
    /// El proveedor informó cuota agotada para la clave activa.
    #[error("cuota agotada: {0}")]
    QuotaExceeded(String),

    /// Fallo de red, HTTP o decodificación sin relación con la cuota.
    #[error("error de transporte: {0}")]
    Transport(String),
}

impl SearchError {
    pub fn is_quota(&self) -> bool {
        matches!(self, SearchError::QuotaExceeded(_))
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Transport(err.to_string())
    }
}

/// Errores del almacén duradero de caché.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Otro escritor ya guardó esta clave. Quien llama lo trata como éxito.
    #[error("entrada de caché duplicada: {0}")]
    Duplicate(String),

    /// El nivel duradero no se puede alcanzar o leer.
    #[error("caché no disponible: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}
