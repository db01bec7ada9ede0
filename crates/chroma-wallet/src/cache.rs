//! Token metadata lookup with a bounded, expiring in-memory cache.
//!
//! Metadata lives off-chain in a registry keyed by color id. Misses are
//! cached too, so a color with no registered metadata is not fetched again
//! until its entry expires. Lookup failures are returned and never cached.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chroma_core::error::NetworkError;
use chroma_core::types::ColorId;

use crate::metadata::Metadata;

/// Off-chain store of token metadata.
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// `Ok(None)` when the registry has no entry for `color`.
    async fn fetch(&self, color: &ColorId) -> Result<Option<Metadata>, NetworkError>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long an entry (hit or miss) stays valid.
    pub ttl: Duration,
    /// Maximum number of entries.
    pub capacity: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            capacity: 256,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    metadata: Option<Metadata>,
    stored_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct TokenMetadataCache {
    policy: CachePolicy,
    entries: HashMap<ColorId, Entry>,
}

impl TokenMetadataCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached lookup. The outer `None` means "not cached"; `Some(None)` is a
    /// cached miss.
    pub fn get(&self, color: &ColorId) -> Option<Option<&Metadata>> {
        self.get_at(color, Instant::now())
    }

    pub fn insert(&mut self, color: ColorId, metadata: Option<Metadata>) {
        self.insert_at(color, metadata, Instant::now());
    }

    pub fn invalidate(&mut self, color: &ColorId) {
        self.entries.remove(color);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached metadata for `color`, fetching from `registry` on a miss or expiry.
    pub async fn get_or_fetch<R: TokenRegistry + ?Sized>(
        &mut self,
        registry: &R,
        color: &ColorId,
    ) -> Result<Option<Metadata>, NetworkError> {
        if let Some(cached) = self.get(color) {
            return Ok(cached.cloned());
        }
        debug!(color = %color, "metadata cache miss");
        let fetched = registry.fetch(color).await?;
        self.insert(*color, fetched.clone());
        Ok(fetched)
    }

    /// [`Self::get_or_fetch`] for several colors, in order.
    ///
    /// Fails on the first lookup error; entries fetched before it stay cached.
    pub async fn get_many<R: TokenRegistry + ?Sized>(
        &mut self,
        registry: &R,
        colors: &[ColorId],
    ) -> Result<Vec<(ColorId, Option<Metadata>)>, NetworkError> {
        let mut out = Vec::with_capacity(colors.len());
        for color in colors {
            let metadata = self.get_or_fetch(registry, color).await?;
            out.push((*color, metadata));
        }
        Ok(out)
    }

    fn is_fresh(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.policy.ttl
    }

    fn get_at(&self, color: &ColorId, now: Instant) -> Option<Option<&Metadata>> {
        let entry = self.entries.get(color)?;
        self.is_fresh(entry, now).then_some(entry.metadata.as_ref())
    }

    fn insert_at(&mut self, color: ColorId, metadata: Option<Metadata>, now: Instant) {
        if self.policy.capacity == 0 {
            return;
        }
        if !self.entries.contains_key(&color) && self.entries.len() >= self.policy.capacity {
            self.evict(now);
        }
        self.entries.insert(
            color,
            Entry {
                metadata,
                stored_at: now,
            },
        );
    }

    /// Drop expired entries, then the oldest if still full.
    fn evict(&mut self, now: Instant) {
        let ttl = self.policy.ttl;
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
        while self.entries.len() >= self.policy.capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(c, _)| *c)
            else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::types::TokenType;
    use parking_lot::Mutex;

    fn color(n: u8) -> ColorId {
        ColorId::new(TokenType::NonReissuable, [n; 32])
    }

    /// Counts fetches; colors listed in `known` resolve to metadata.
    #[derive(Default)]
    struct Registry {
        known: Vec<ColorId>,
        fail: bool,
        fetches: Mutex<u32>,
    }

    #[async_trait]
    impl TokenRegistry for Registry {
        async fn fetch(&self, color: &ColorId) -> Result<Option<Metadata>, NetworkError> {
            *self.fetches.lock() += 1;
            if self.fail {
                return Err(NetworkError::Timeout);
            }
            Ok(self
                .known
                .contains(color)
                .then(|| Metadata::new("Token", "TKN", TokenType::NonReissuable)))
        }
    }

    #[tokio::test]
    async fn hit_and_miss_are_cached() {
        let registry = Registry {
            known: vec![color(1)],
            ..Default::default()
        };
        let mut cache = TokenMetadataCache::new(CachePolicy::default());

        assert!(cache.get_or_fetch(&registry, &color(1)).await.unwrap().is_some());
        assert!(cache.get_or_fetch(&registry, &color(2)).await.unwrap().is_none());
        assert!(cache.get_or_fetch(&registry, &color(1)).await.unwrap().is_some());
        assert!(cache.get_or_fetch(&registry, &color(2)).await.unwrap().is_none());
        assert_eq!(*registry.fetches.lock(), 2);
        assert_eq!(cache.get(&color(2)), Some(None));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let registry = Registry {
            fail: true,
            ..Default::default()
        };
        let mut cache = TokenMetadataCache::default();
        assert_eq!(
            cache.get_or_fetch(&registry, &color(1)).await.unwrap_err(),
            NetworkError::Timeout
        );
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn get_many_preserves_order() {
        let registry = Registry {
            known: vec![color(2)],
            ..Default::default()
        };
        let mut cache = TokenMetadataCache::new(CachePolicy::default());
        let out = cache
            .get_many(&registry, &[color(3), color(2)])
            .await
            .unwrap();
        assert_eq!(out[0].0, color(3));
        assert!(out[0].1.is_none());
        assert!(out[1].1.is_some());
    }

    #[test]
    fn entries_expire() {
        let mut cache = TokenMetadataCache::new(CachePolicy {
            ttl: Duration::from_secs(10),
            capacity: 4,
        });
        let t0 = Instant::now();
        cache.insert_at(color(1), None, t0);
        assert_eq!(cache.get_at(&color(1), t0 + Duration::from_secs(9)), Some(None));
        assert_eq!(cache.get_at(&color(1), t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn full_cache_evicts_expired_then_oldest() {
        let mut cache = TokenMetadataCache::new(CachePolicy {
            ttl: Duration::from_secs(100),
            capacity: 2,
        });
        let t0 = Instant::now();
        cache.insert_at(color(1), None, t0);
        cache.insert_at(color(2), None, t0 + Duration::from_secs(1));
        cache.insert_at(color(3), None, t0 + Duration::from_secs(2));
        assert_eq!(cache.len(), 2);
        assert!(!cache.entries.contains_key(&color(1)));

        // color(2) and color(3) have both expired by now.
        let later = t0 + Duration::from_secs(200);
        cache.insert_at(color(4), None, later);
        assert_eq!(cache.len(), 1);
        assert!(cache.entries.contains_key(&color(4)));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = TokenMetadataCache::new(CachePolicy {
            ttl: Duration::from_secs(1),
            capacity: 0,
        });
        cache.insert(color(1), None);
        assert!(cache.is_empty());
    }
}
