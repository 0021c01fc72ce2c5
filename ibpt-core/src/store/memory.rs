use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::clock::{Clock, SystemClock, expiry_after};
use super::rate_store::{RateStore, StoreError};
use crate::models::FieldMap;

type Entries = HashMap<String, (FieldMap, DateTime<Utc>)>;

/// In-process [`RateStore`].
///
/// Expired entries are dropped when a read finds them; nothing sweeps the
/// map in the background.
pub struct MemoryStore {
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.expires_at(key).is_some()
    }

    /// Expiry of the live entry under `key`.
    pub fn expires_at(
        &self,
        key: &str,
    ) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.entries()
            .get(key)
            .map(|(_, expires_at)| *expires_at)
            .filter(|expires_at| now < *expires_at)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries()
            .values()
            .filter(|(_, expires_at)| now < *expires_at)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<FieldMap>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get(key) {
            Some((fields, expires_at)) if now < *expires_at => Ok(Some(fields.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        fields: &FieldMap,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let expires_at = expiry_after(self.clock.now(), ttl_seconds);
        self.entries()
            .insert(key.to_string(), (fields.clone(), expires_at));
        Ok(())
    }
}
