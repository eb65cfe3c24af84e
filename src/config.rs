use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::LookupMode;
use crate::pacing::ThrottleMode;

/// Último `YOUTUBE_API_KEY_n` que se lee.
pub const MAX_KEY_SLOTS: usize = 50;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // APIs
    pub api_keys: Vec<String>,
    pub mirror_instances: Vec<String>,

    // Caché
    pub cache_dir: PathBuf,
    pub cache_lookup: LookupMode,

    // Ritmo
    pub batch_delay: Duration,
    pub throttle_mode: ThrottleMode,

    // Timeouts
    pub http_timeout: Duration,
    pub mirror_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Construye la configuración desde cualquier fuente de variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            api_keys: Self::read_api_keys(&var),
            mirror_instances: var("INVIDIOUS_INSTANCES")
                .map(|list| {
                    list.split(',')
                        .map(|s| s.trim().trim_end_matches('/').to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            cache_dir: var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_lookup: match var("CACHE_LOOKUP") {
                Some(v) => v.parse::<LookupMode>().map_err(anyhow::Error::msg)?,
                None => defaults.cache_lookup,
            },

            batch_delay: match var("BATCH_DELAY") {
                Some(v) => humantime::parse_duration(&v).context("BATCH_DELAY inválido")?,
                None => defaults.batch_delay,
            },
            throttle_mode: match var("THROTTLE_MODE") {
                Some(v) => v.parse::<ThrottleMode>().map_err(anyhow::Error::msg)?,
                None => defaults.throttle_mode,
            },

            http_timeout: match var("HTTP_TIMEOUT") {
                Some(v) => humantime::parse_duration(&v).context("HTTP_TIMEOUT inválido")?,
                None => defaults.http_timeout,
            },
            mirror_timeout: match var("MIRROR_TIMEOUT") {
                Some(v) => humantime::parse_duration(&v).context("MIRROR_TIMEOUT inválido")?,
                None => defaults.mirror_timeout,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Primero las claves numeradas; la clave única heredada solo si no hay ninguna.
    fn read_api_keys<F>(var: &F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let numbered: Vec<String> = (1..=MAX_KEY_SLOTS)
            .filter_map(|i| var(&format!("YOUTUBE_API_KEY_{}", i)))
            .map(|k| k.trim().to_string())
            .collect();

        if !numbered.is_empty() {
            return numbered;
        }

        var("YOUTUBE_API_KEY")
            .map(|k| vec![k.trim().to_string()])
            .unwrap_or_default()
    }

    /// Valida los valores de configuración.
    ///
    /// # Reglas
    ///
    /// - Los espejos deben ser URLs `http(s)` absolutas
    /// - Los timeouts no pueden ser cero
    pub fn validate(&self) -> Result<()> {
        for instance in &self.mirror_instances {
            let url = url::Url::parse(instance)
                .with_context(|| format!("URL de espejo inválida: {}", instance))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("El espejo debe usar http(s), se recibió: {}", instance);
            }
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("El timeout HTTP debe ser mayor que 0");
        }

        if self.mirror_timeout.is_zero() {
            anyhow::bail!("El timeout de espejos debe ser mayor que 0");
        }

        Ok(())
    }

    /// Resumen de la configuración para el log.
    ///
    /// De las claves de API solo se muestra cuántas hay.
    pub fn summary(&self) -> String {
        format!(
            "Resumen de configuración:\n  \
            Claves de API: {}\n  \
            Espejos: {}\n  \
            Caché: {} (búsqueda {:?})\n  \
            Ritmo: {} ({:?})\n  \
            Timeouts: http {}, espejos {}",
            self.api_keys.len(),
            if self.mirror_instances.is_empty() {
                "desactivados".to_string()
            } else {
                self.mirror_instances.join(", ")
            },
            self.cache_dir.display(),
            self.cache_lookup,
            humantime::format_duration(self.batch_delay),
            self.throttle_mode,
            humantime::format_duration(self.http_timeout),
            humantime::format_duration(self.mirror_timeout),
        )
    }
}

/// Valores por defecto de la configuración.
///
/// Se usan cuando no se definen las variables de entorno.
impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            mirror_instances: Vec::new(),

            cache_dir: "./data/track_cache".into(),
            cache_lookup: LookupMode::Exact,

            batch_delay: Duration::from_millis(100),
            throttle_mode: ThrottleMode::LiveOnly,

            http_timeout: Duration::from_secs(10),
            mirror_timeout: Duration::from_secs(5),
        }
    }
}
