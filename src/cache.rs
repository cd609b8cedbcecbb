//! In-memory cache of survey-based estimates.
//!
//! Entries are keyed by campaign id and remember a SHA-256 fingerprint
//! of the response set they were computed from.  A stored result is
//! reused only while the fingerprint still matches and the entry is
//! younger than the TTL, so stale reads are prevented at lookup time.
//! The periodic sweep ([`ResultCache::sweep`], [`ResultCache::spawn_sweeper`])
//! only reclaims memory.
//!
//! Concurrent misses for the same campaign are not deduplicated: each
//! caller recomputes outside the lock and the last write wins.  The
//! computation is deterministic, so this costs duplicate work but never
//! yields a different value.

use crate::engine::calculate_micro;
use crate::error::Result;
use crate::models::{CalculationResult, CompanyFinancials, ResponseRecord};
use crate::settings::{CacheSettings, MicroCoefficients};
use crate::survey::aggregate;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static GLOBAL: Lazy<ResultCache> = Lazy::new(|| ResultCache::new(&CacheSettings::default()));

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CalculationResult,
    response_count: usize,
    content_hash: String,
    computed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age at `now`; an entry stamped in the future counts as brand new.
    fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.computed_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Answer of [`ResultCache::get_or_compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCalculation {
    pub result: CalculationResult,
    pub from_cache: bool,
    /// Set on cache hits only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<f64>,
}

/// Snapshot of one cached campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCacheInfo {
    pub campaign_id: String,
    pub response_count: usize,
    pub content_hash: String,
    pub age_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub ttl_seconds: u64,
    pub campaigns: Vec<CampaignCacheInfo>,
}

/// Order-independent SHA-256 fingerprint of a response set, hex encoded.
pub fn content_hash(responses: &[ResponseRecord]) -> String {
    let mut sorted: Vec<&ResponseRecord> = responses.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update((sorted.len() as u64).to_le_bytes());
    for response in sorted {
        hasher.update([
            response.prevalence as u8,
            response.efficiency.percent(),
            response.working_hours as u8,
        ]);
        hash_set(&mut hasher, &response.factors, |f| *f as u8);
        hash_set(&mut hasher, &response.impacts, |i| *i as u8);
    }
    hex::encode(hasher.finalize())
}

// Length-prefixed so that adjacent sets cannot collide.
fn hash_set<T>(hasher: &mut Sha256, set: &BTreeSet<T>, tag: impl Fn(&T) -> u8) {
    hasher.update((set.len() as u32).to_le_bytes());
    let tags: Vec<u8> = set.iter().map(tag).collect();
    hasher.update(&tags);
}

/// Campaign-keyed cache of survey-based estimates.
///
/// Cloning is cheap and yields a handle on the same map.
#[derive(Debug, Clone)]
pub struct ResultCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(&CacheSettings::default())
    }
}

impl ResultCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: settings.ttl(),
        }
    }

    /// Process-wide cache with the default TTL.
    pub fn global() -> &'static ResultCache {
        &GLOBAL
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached estimate for `campaign_id` when it is still
    /// fresh, otherwise aggregate `responses`, cost them and store the
    /// result.
    ///
    /// Errors from the computation are returned as-is and nothing is
    /// stored.
    pub fn get_or_compute(
        &self,
        campaign_id: &str,
        responses: &[ResponseRecord],
        financials: &CompanyFinancials,
        coefficients: &MicroCoefficients,
        force_recalculate: bool,
    ) -> Result<CachedCalculation> {
        self.get_or_compute_at(
            campaign_id,
            responses,
            financials,
            coefficients,
            force_recalculate,
            Utc::now(),
        )
    }

    /// [`get_or_compute`](Self::get_or_compute) evaluated at an explicit
    /// instant.
    pub fn get_or_compute_at(
        &self,
        campaign_id: &str,
        responses: &[ResponseRecord],
        financials: &CompanyFinancials,
        coefficients: &MicroCoefficients,
        force_recalculate: bool,
        now: DateTime<Utc>,
    ) -> Result<CachedCalculation> {
        let hash = content_hash(responses);

        if !force_recalculate {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(campaign_id) {
                let age = entry.age(now);
                if entry.content_hash == hash && age < self.ttl {
                    debug!(campaign_id, age_secs = age.as_secs_f64(), "presenteeism cache hit");
                    return Ok(CachedCalculation {
                        result: entry.result.clone(),
                        from_cache: true,
                        cache_age_seconds: Some(age.as_secs_f64()),
                    });
                }
            }
        }

        debug!(
            campaign_id,
            responses = responses.len(),
            force_recalculate,
            "presenteeism cache miss, recomputing"
        );
        let stats = aggregate(responses);
        let result = calculate_micro(financials, &stats, coefficients)?;

        let entry = CacheEntry {
            result: result.clone(),
            response_count: responses.len(),
            content_hash: hash,
            computed_at: now,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(campaign_id.to_string(), entry);

        Ok(CachedCalculation {
            result,
            from_cache: false,
            cache_age_seconds: None,
        })
    }

    /// Drop the entry of one campaign.  Returns whether one existed.
    pub fn invalidate(&self, campaign_id: &str) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(campaign_id)
            .is_some();
        if removed {
            info!(campaign_id, "presenteeism cache entry invalidated");
        }
        removed
    }

    pub fn clear_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        entries.clear();
        info!(count, "presenteeism cache cleared");
    }

    /// Remove every entry older than the TTL.  Returns how many went.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        // Collect under the read lock, delete under a short write lock.
        let expired: Vec<String> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .filter(|(_, entry)| entry.age(now) >= self.ttl)
                .map(|(id, _)| id.clone())
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for id in &expired {
            // The entry may have been refreshed since it was collected.
            if entries.get(id).is_some_and(|entry| entry.age(now) >= self.ttl) {
                entries.remove(id);
                removed += 1;
            }
        }
        info!(removed, "presenteeism cache swept");
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` on the current tokio
    /// runtime until the returned handle is aborted.
    ///
    /// Returns `None` when called outside a tokio runtime; the host then
    /// has to call [`sweep`](Self::sweep) itself.
    pub fn spawn_sweeper(&self, interval: Duration) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime, presenteeism cache sweeper not started");
            return None;
        };
        let cache = self.clone();
        Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep();
            }
        }))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut campaigns: Vec<CampaignCacheInfo> = entries
            .iter()
            .map(|(id, entry)| CampaignCacheInfo {
                campaign_id: id.clone(),
                response_count: entry.response_count,
                content_hash: entry.content_hash.clone(),
                age_seconds: entry.age(now).as_secs_f64(),
            })
            .collect();
        campaigns.sort_by(|a, b| a.campaign_id.cmp(&b.campaign_id));
        CacheStats {
            entries: campaigns.len(),
            ttl_seconds: self.ttl.as_secs(),
            campaigns,
        }
    }
}
