use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use pairup_types::models::{Candidate, Group, GroupId};

use crate::cache::CandidateCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::scoring;
use crate::store::MatchStore;

/// Result of a candidate search.
#[derive(Debug, Clone, Default)]
pub struct CandidateSearch {
    pub candidates: Vec<Candidate>,
    /// Set when the search ran out of time and returned early.
    pub partial: bool,
}

pub struct CandidateFinder {
    store: Arc<dyn MatchStore>,
    cache: CandidateCache,
    /// Requester -> last group its previous scan reached.
    cursors: Cache<GroupId, GroupId>,
    min_score: u8,
    max_results: usize,
    scan_limit: usize,
    timeout: Duration,
}

impl CandidateFinder {
    pub fn new(store: Arc<dyn MatchStore>, cache: CandidateCache, config: &EngineConfig) -> Self {
        Self {
            store,
            cache,
            cursors: Cache::new(config.cache_capacity),
            min_score: config.min_score,
            max_results: config.max_candidates,
            scan_limit: config.scan_limit,
            timeout: config.search_timeout,
        }
    }

    /// Ranked candidates for `group_id`, best first.
    pub async fn find(&self, group_id: GroupId) -> EngineResult<CandidateSearch> {
        let requester = self
            .store
            .get_group(group_id)
            .await?
            .ok_or(EngineError::NotFound("group"))?;

        if !requester.is_available() {
            debug!("Group {} is not looking for matches, no candidates", group_id);
            return Ok(CandidateSearch::default());
        }

        if let Some(cached) = self.cache.get(group_id).await {
            return self.revalidate(&cached).await;
        }

        match tokio::time::timeout(self.timeout, self.search(&requester)).await {
            Ok(result) => {
                let candidates = result?;
                self.cache.insert(group_id, candidates.clone()).await;
                Ok(CandidateSearch { candidates, partial: false })
            }
            Err(_) => {
                warn!("Candidate search for {} exceeded {:?}, returning empty", group_id, self.timeout);
                Ok(CandidateSearch { candidates: Vec::new(), partial: true })
            }
        }
    }

    async fn search(&self, requester: &Group) -> EngineResult<Vec<Candidate>> {
        // First scan starts at a random point; later ones continue where the last stopped.
        let start_after = self.cursors.get(&requester.id).await.unwrap_or_else(GroupId::new);
        let pool = self
            .store
            .list_available_groups(requester.id, start_after, self.scan_limit)
            .await?;
        match pool.last() {
            Some(last) => self.cursors.insert(requester.id, last.id).await,
            None => self.cursors.invalidate(&requester.id).await,
        }
        let examined = pool.len();

        let mut ranked: Vec<Candidate> = pool
            .into_iter()
            .filter(|g| g.id != requester.id && g.is_available())
            .filter_map(|group| {
                let score = scoring::score(requester, &group);
                (score >= self.min_score).then_some(Candidate { group, score })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.group.id.cmp(&b.group.id)));
        ranked.truncate(self.max_results);

        debug!(
            "Candidate search for {}: examined {}, kept {}",
            requester.id,
            examined,
            ranked.len()
        );
        Ok(ranked)
    }

    /// Cached lists may name groups that matched or closed since; drop those.
    async fn revalidate(&self, cached: &[Candidate]) -> EngineResult<CandidateSearch> {
        let ids: Vec<GroupId> = cached.iter().map(|c| c.group.id).collect();
        let fresh = self.store.get_groups(&ids).await?;

        let candidates = cached
            .iter()
            .filter_map(|c| {
                fresh
                    .iter()
                    .find(|g| g.id == c.group.id && g.is_available())
                    .map(|g| Candidate { group: g.clone(), score: c.score })
            })
            .collect();

        Ok(CandidateSearch { candidates, partial: false })
    }
}
