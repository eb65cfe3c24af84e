use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Qué llamadas pasan por el limitador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThrottleMode {
    /// Solo esperan las consultas que llegan a un proveedor en vivo.
    #[default]
    LiveOnly,
    /// Todas las consultas esperan, incluidos los aciertos de caché.
    Uniform,
}

impl FromStr for ThrottleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live-only" | "live_only" | "live" => Ok(ThrottleMode::LiveOnly),
            "uniform" => Ok(ThrottleMode::Uniform),
            other => Err(format!("modo de ritmo desconocido: {}", other)),
        }
    }
}

/// Limitador de ritmo entre llamadas consecutivas.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Espera hasta que la siguiente llamada esté permitida y reserva ese turno.
    async fn ready(&self);
}

/// Cubeta con un solo turno: dos turnos consecutivos distan al menos `interval`.
///
/// Usa `tokio::time`, así que las pruebas lo controlan con el reloj en pausa.
#[derive(Debug)]
pub struct IntervalPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl IntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Pacer for IntervalPacer {
    async fn ready(&self) {
        let now = Instant::now();
        let slot = {
            let mut next = self.next_slot.lock();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        if slot > now {
            debug!("⏳ Ritmo: esperando {:?}", slot - now);
            tokio::time::sleep_until(slot).await;
        }
    }
}

/// Limitador que nunca espera.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn ready(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate_then_spaced() {
        let pacer = IntervalPacer::new(Duration::from_millis(100));
        let start = Instant::now();

        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_counts_toward_the_interval() {
        let pacer = IntervalPacer::new(Duration::from_millis(100));
        let start = Instant::now();

        pacer.ready().await;
        tokio::time::advance(Duration::from_millis(250)).await;
        pacer.ready().await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn throttle_mode_parses() {
        assert_eq!("uniform".parse::<ThrottleMode>(), Ok(ThrottleMode::Uniform));
        assert_eq!("live-only".parse::<ThrottleMode>(), Ok(ThrottleMode::LiveOnly));
        assert!("burst".parse::<ThrottleMode>().is_err());
    }
}
