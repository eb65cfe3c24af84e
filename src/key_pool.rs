use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Pool ordenado de claves de la API con cursor rotativo.
///
/// El cursor solo avanza (con vuelta al inicio) y no se reinicia mientras
/// viva el proceso. Es atómico para compartir el pool tras un `Arc`.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        debug!("🔑 Pool de claves iniciado con {} clave(s)", keys.len());

        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Clave activa, o `None` si el pool está vacío.
    pub fn current(&self) -> Option<&str> {
        self.current_slot().map(|(_, key)| key)
    }

    /// Clave activa junto con la posición de la que se leyó.
    pub fn current_slot(&self) -> Option<(usize, &str)> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.cursor.load(Ordering::SeqCst) % self.keys.len();
        Some((index, self.keys[index].as_str()))
    }

    /// Avanza el cursor una posición. Devuelve `false` con 0 o 1 claves.
    pub fn rotate(&self) -> bool {
        if self.keys.len() <= 1 {
            return false;
        }
        let len = self.keys.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        warn!("🔄 Rotando clave de API: posición {} -> {}", previous, (previous + 1) % len);
        true
    }

    /// Rota desde `slot` solo si el cursor sigue apuntando ahí.
    ///
    /// Si otro llamador ya pasó de la posición agotada no hace nada y aun así
    /// devuelve `true`: un evento de cuota avanza el cursor como mucho una vez.
    pub fn rotate_from(&self, slot: usize) -> bool {
        if self.keys.len() <= 1 {
            return false;
        }
        let next = (slot + 1) % self.keys.len();
        match self
            .cursor
            .compare_exchange(slot, next, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {
                warn!("🔄 Rotando clave de API: posición {} -> {}", slot, next);
            }
            Err(actual) => {
                debug!("La posición {} ya rotó (cursor en {})", slot, actual);
            }
        }
        true
    }
}
