use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::models::{CacheKey, MatchResult, TrackQuery};

/// Registro persistido en el almacén duradero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRecord {
    pub track_name: String,
    pub artist_name: String,
    pub duration_ms: u64,
    pub video_id: String,
    pub video_title: String,
    pub video_duration: u64,
    pub thumbnail_url: Option<String>,
    pub channel_title: Option<String>,
    pub cached_at: DateTime<Utc>,
}

impl CachedRecord {
    pub fn new(query: &TrackQuery, result: &MatchResult) -> Self {
        Self {
            track_name: query.name.clone(),
            artist_name: query.artist.clone(),
            duration_ms: query.duration_ms,
            video_id: result.video_id.clone(),
            video_title: result.title.clone(),
            video_duration: result.duration_ms,
            thumbnail_url: result.thumbnail_url.clone(),
            channel_title: result.channel_title.clone(),
            cached_at: Utc::now(),
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.artist_name, &self.track_name)
    }

    pub fn to_match(&self) -> MatchResult {
        MatchResult {
            video_id: self.video_id.clone(),
            title: self.video_title.clone(),
            duration_ms: self.video_duration,
            thumbnail_url: self.thumbnail_url.clone(),
            channel_title: self.channel_title.clone(),
        }
    }
}

/// Nivel duradero y compartido de la caché.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Búsqueda exacta por clave normalizada.
    async fn find(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError>;

    /// Búsqueda por subcadena sin distinguir mayúsculas; gana el primer registro.
    async fn find_loose(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError>;

    /// Inserta un registro. Si la clave ya existe devuelve `CacheError::Duplicate`.
    async fn insert(&self, record: &CachedRecord) -> Result<(), CacheError>;
}

/// Estado de un archivo de registro en disco.
enum OnDisk {
    Missing,
    Record(CachedRecord),
    Corrupt,
}

/// Almacenamiento basado en archivos JSON, un archivo por clave.
///
/// Cada registro se enlaza en su sitio sin sobrescribir: si dos procesos
/// escriben la misma clave, el primero gana y el resto recibe `Duplicate`.
/// Un archivo ilegible no bloquea la clave; la siguiente inserción lo reemplaza.
pub struct JsonFileStore {
    data_dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl JsonFileStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&data_dir).await?;
        info!("📁 Caché de pistas inicializada en: {}", data_dir.display());
        Ok(Self {
            data_dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.data_dir.join(format!("{}.json", record_digest(key)))
    }

    async fn load(&self, path: &Path) -> Result<OnDisk, CacheError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(OnDisk::Missing),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(OnDisk::Record(record)),
            Err(e) => {
                warn!("Registro de caché ilegible {}: {}", path.display(), e);
                Ok(OnDisk::Corrupt)
            }
        }
    }

    async fn read_record(&self, path: &Path) -> Result<Option<CachedRecord>, CacheError> {
        match self.load(path).await? {
            OnDisk::Record(record) => Ok(Some(record)),
            OnDisk::Missing | OnDisk::Corrupt => Ok(None),
        }
    }

    /// Escribe el contenido en un archivo temporal junto a `path`.
    /// Si la escritura falla, el temporal se borra antes de devolver el error.
    async fn write_temp(&self, path: &Path, content: &str) -> Result<PathBuf, CacheError> {
        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            self.tmp_seq.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = fs::write(&tmp, content).await {
            remove_temp(&tmp).await;
            return Err(e.into());
        }
        Ok(tmp)
    }

    /// Número de registros en disco.
    pub async fn count(&self) -> Result<usize, CacheError> {
        let mut files = fs::read_dir(&self.data_dir).await?;
        let mut count = 0;
        while let Some(entry) = files.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn find(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError> {
        let record = self.read_record(&self.record_path(key)).await?;
        Ok(record.filter(|r| &r.key() == key))
    }

    async fn find_loose(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError> {
        if let Some(record) = self.find(key).await? {
            return Ok(Some(record));
        }

        let mut files = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Some(record) = self.read_record(&path).await? {
                if key.loosely_matches(&record.artist_name, &record.track_name) {
                    debug!("Hit aproximado en caché para '{}' -> '{}'", key, record.key());
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    async fn insert(&self, record: &CachedRecord) -> Result<(), CacheError> {
        let key = record.key();
        let path = self.record_path(&key);
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        match self.load(&path).await? {
            OnDisk::Record(_) => return Err(CacheError::Duplicate(key.to_string())),
            OnDisk::Corrupt => {
                let tmp = self.write_temp(&path, &content).await?;
                if let Err(e) = fs::rename(&tmp, &path).await {
                    remove_temp(&tmp).await;
                    return Err(e.into());
                }
                info!("🔧 Registro ilegible reemplazado para '{}'", key);
                return Ok(());
            }
            OnDisk::Missing => {}
        }

        // El enlace falla si otro escritor llegó antes; nadie lee un registro a medias.
        let tmp = self.write_temp(&path, &content).await?;
        let linked = fs::hard_link(&tmp, &path).await;
        remove_temp(&tmp).await;

        match linked {
            Ok(()) => {
                debug!("💾 Registro guardado en caché para '{}'", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(CacheError::Duplicate(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_temp(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("No se pudo borrar el temporal {}: {}", tmp.display(), e);
        }
    }
}

/// SHA-256 en hexadecimal de la clave normalizada; nombre de archivo estable entre procesos.
fn record_digest(key: &CacheKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.artist().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(key.name().as_bytes());
    hex::encode(hasher.finalize())
}

/// Almacén duradero en memoria, para uso embebido y pruebas.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<CacheKey, CachedRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn find(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn find_loose(&self, key: &CacheKey) -> Result<Option<CachedRecord>, CacheError> {
        if let Some(record) = self.find(key).await? {
            return Ok(Some(record));
        }
        Ok(self
            .records
            .iter()
            .find(|r| key.loosely_matches(&r.artist_name, &r.track_name))
            .map(|r| r.value().clone()))
    }

    async fn insert(&self, record: &CachedRecord) -> Result<(), CacheError> {
        match self.records.entry(record.key()) {
            Entry::Occupied(entry) => Err(CacheError::Duplicate(entry.key().to_string())),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                Ok(())
            }
        }
    }
}
