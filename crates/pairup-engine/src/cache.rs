use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use pairup_types::models::{Candidate, GroupId};

#[derive(Clone)]
pub struct CandidateCache {
    inner: Cache<GroupId, Arc<Vec<Candidate>>>,
}

impl CandidateCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self, group: GroupId) -> Option<Arc<Vec<Candidate>>> {
        self.inner.get(&group).await
    }

    pub async fn insert(&self, group: GroupId, candidates: Vec<Candidate>) {
        self.inner.insert(group, Arc::new(candidates)).await;
    }

    /// The single invalidation entry point: drop every listed group's entry.
    pub async fn invalidate(&self, groups: &[GroupId]) {
        for group in groups {
            self.inner.invalidate(group).await;
        }
        debug!("Candidate cache invalidated for {} group(s)", groups.len());
    }

    pub async fn contains(&self, group: GroupId) -> bool {
        self.inner.get(&group).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalidate_drops_only_listed_groups() {
        let cache = CandidateCache::new(100, Duration::from_secs(60));
        let a = GroupId::new();
        let b = GroupId::new();
        let c = GroupId::new();
        for g in [a, b, c] {
            cache.insert(g, Vec::new()).await;
        }

        cache.invalidate(&[a, b]).await;

        assert!(!cache.contains(a).await);
        assert!(!cache.contains(b).await);
        assert!(cache.contains(c).await);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = CandidateCache::new(100, Duration::from_millis(20));
        let a = GroupId::new();
        cache.insert(a, Vec::new()).await;
        assert!(cache.contains(a).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!cache.contains(a).await);
    }
}
