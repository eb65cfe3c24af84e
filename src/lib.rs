//! Resuelve pistas `(título, artista, duración)` a vídeos reproducibles
//! gastando la menor cuota posible de la API de búsqueda.
//!
//! Las piezas, de las hojas hacia arriba:
//!
//! - [`key_pool::KeyPool`]: claves de la API con cursor rotativo.
//! - [`cache::CacheStore`]: caché efímera + duradera.
//! - [`scoring`]: selección determinista del mejor candidato.
//! - [`sources::SearchClient`]: búsqueda en YouTube Data API v3 con espejos
//!   de Invidious como respaldo.
//! - [`resolver::Resolver`]: caché → búsqueda con rotación de claves → escritura en caché.
//! - [`pipeline::BatchPipeline`]: lotes ordenados, con ritmo y cancelables.

pub mod cache;
pub mod config;
pub mod error;
pub mod key_pool;
pub mod models;
pub mod pacing;
pub mod pipeline;
pub mod resolver;
pub mod scoring;
pub mod sources;
pub mod storage;

pub use config::Config;
pub use models::{CacheKey, MatchResult, ResolvedTrack, TrackQuery};
pub use pipeline::{BatchPipeline, BatchReport};
pub use resolver::{Resolution, Resolver};
