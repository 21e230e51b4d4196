use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::UpstreamError;
use crate::observation::{FetchWindow, Observation};
use crate::upstream::ObservationSource;

#[derive(Debug)]
struct Entry {
    fetched_at: Instant,
    observations: Arc<Vec<Observation>>,
}

type Slot = tokio::sync::Mutex<Option<Entry>>;

/// Time-bounded cache of upstream fetches, keyed by fetch window.
///
/// Each window has its own fill lock: concurrent misses for the same window
/// wait for the first fetch and share its result. Failed fetches are not
/// stored.
#[derive(Debug)]
pub struct WindowCache {
    ttl: Duration,
    slots: Mutex<HashMap<FetchWindow, Arc<Slot>>>,
}

impl WindowCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_fetch(
        &self,
        source: &dyn ObservationSource,
        window: FetchWindow,
    ) -> Result<Arc<Vec<Observation>>, UpstreamError> {
        let slot = {
            let mut slots = self.lock_slots();
            Arc::clone(slots.entry(window).or_default())
        };

        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                log::debug!("Cache hit for {}", window);
                return Ok(Arc::clone(&cached.observations));
            }
        }

        let observations = Arc::new(source.fetch_observations(window).await?);
        log::debug!(
            "Cached {} observations for {} (ttl {:?})",
            observations.len(),
            window,
            self.ttl
        );
        *entry = Some(Entry {
            fetched_at: Instant::now(),
            observations: Arc::clone(&observations),
        });
        drop(entry);

        self.purge_expired();
        Ok(observations)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock_slots().len()
    }

    /// Drops expired and never-filled slots that nobody is waiting on.
    fn purge_expired(&self) {
        let ttl = self.ttl;
        self.lock_slots().retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => matches!(entry.as_ref(), Some(e) if e.fetched_at.elapsed() < ttl),
                Err(_) => true,
            }
        });
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<FetchWindow, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
