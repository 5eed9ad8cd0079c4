//! TTL-guarded cache of the provider's reference dataset.
//!
//! Trigger registration resolves spatial constraints against this cache. The
//! entry set is replaced wholesale on refresh and kept sorted by id so that
//! nearest-match ties resolve deterministically to the smallest id. Refresh
//! and resolution share one mutex: a refresh is never interleaved with a
//! read, and two refreshes never run concurrently.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::geo;
use crate::model::{Coordinate, ReferenceEntry};
use crate::provider::ProviderClient;
use crate::trigger::ResolvedReference;

#[derive(Clone, Debug)]
pub struct ReferenceCacheConfig {
    /// Seconds before the cached entry set is considered stale. Reference
    /// datasets change rarely; the default is one year.
    pub ttl_seconds: u64,
    /// Candidates farther than this from the query coordinate are excluded.
    pub max_distance_km: f64,
}

impl Default for ReferenceCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 31_536_000,
            max_distance_km: 50.0,
        }
    }
}

struct CacheState {
    entries: Vec<ReferenceEntry>,
    last_refreshed: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct ReferenceCache {
    provider: Arc<dyn ProviderClient>,
    clock: Arc<dyn Clock>,
    config: ReferenceCacheConfig,
    state: Mutex<CacheState>,
}

impl ReferenceCache {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        clock: Arc<dyn Clock>,
        config: ReferenceCacheConfig,
    ) -> Self {
        Self {
            provider,
            clock,
            config,
            state: Mutex::new(CacheState {
                entries: Vec::new(),
                last_refreshed: None,
            }),
        }
    }

    /// Resolve a coordinate to the nearest reference entry within the
    /// configured maximum distance.
    ///
    /// Refreshes the entry set first when it is stale. An empty successful
    /// refresh still restarts the TTL window; a failed refresh keeps the
    /// previous set and timestamp, so the next resolution retries.
    pub async fn resolve(&self, coordinate: Coordinate) -> Option<ResolvedReference> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let stale = match state.last_refreshed {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    > chrono::Duration::seconds(self.config.ttl_seconds as i64)
            }
        };

        if stale {
            match self.provider.fetch_reference_entries().await {
                Ok(mut entries) => {
                    entries.sort_by(|a, b| a.id.cmp(&b.id));
                    info!(count = entries.len(), "Refreshed reference entry cache");
                    state.entries = entries;
                    state.last_refreshed = Some(now);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        cached = state.entries.len(),
                        "Reference entry refresh failed, resolving against retained set"
                    );
                }
            }
        }

        let resolved = geo::nearest_within(coordinate, &state.entries, self.config.max_distance_km)
            .map(|(entry, distance_km)| ResolvedReference {
                reference_id: entry.id.clone(),
                coordinate: entry.coordinate(),
                distance_km,
            });

        if resolved.is_none() {
            debug!(
                latitude = coordinate.latitude,
                longitude = coordinate.longitude,
                max_distance_km = self.config.max_distance_km,
                "No reference entry within threshold"
            );
        }

        resolved
    }

    /// Number of cached entries. Zero both before the first refresh and after
    /// an empty one.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
