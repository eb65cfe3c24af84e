use dashmap::DashMap;
use std::{hash::Hash, sync::Arc};

/// Nivel efímero: mapa local al proceso, sin expiración ni desalojo.
///
/// Los clones comparten el mismo mapa.
#[derive(Debug)]
pub struct EphemeralCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, V>>,
}

impl<K, V> EphemeralCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Inserta salvo que la clave ya exista; se conserva el valor anterior.
    pub fn insert_if_absent(&self, key: K, value: V) {
        self.data.entry(key).or_insert(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> Default for EphemeralCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for EphemeralCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_wins_and_clones_share_state() {
        let cache: EphemeralCache<String, u32> = EphemeralCache::new();
        let shared = cache.clone();

        cache.insert_if_absent("a".to_string(), 1);
        shared.insert_if_absent("a".to_string(), 2);

        assert_eq!(shared.get(&"a".to_string()), Some(1));
        assert_eq!(cache.len(), 1);
    }
}
