//! Match creation and teardown.
//!
//! The only code that writes Match records. Creation trusts nothing from the
//! caller: the store's `create_match_if_free` re-checks both groups at write
//! time, so of several concurrent attempts exactly one commits and the rest
//! observe the winner.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use pairup_types::models::{GroupId, InvitationId, Match, MatchId, MatchOrigin, UserId};

use crate::authz::Authorizer;
use crate::cache::CandidateCache;
use crate::config::{EngineConfig, EpochPolicy};
use crate::error::{Conflict, EngineError, EngineResult};
use crate::retry::{self, RetryPolicy};
use crate::store::{MatchStore, StoreError};
use crate::venue::{self, VenueRecommender};

/// The ways two groups can signal mutual interest. Both converge here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestSignal {
    MutualLike,
    InvitationAccepted(InvitationId),
}

impl InterestSignal {
    pub fn origin(&self) -> MatchOrigin {
        match self {
            InterestSignal::MutualLike => MatchOrigin::MutualLike,
            InterestSignal::InvitationAccepted(_) => MatchOrigin::Invitation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Created(Match),
    /// The same pair was already matched, typically by a concurrent signal.
    Existing(Match),
}

impl MatchOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, MatchOutcome::Created(_))
    }

    pub fn into_match(self) -> Match {
        match self {
            MatchOutcome::Created(m) | MatchOutcome::Existing(m) => m,
        }
    }
}

pub struct MatchCreator {
    store: Arc<dyn MatchStore>,
    authz: Arc<dyn Authorizer>,
    cache: CandidateCache,
    recommender: Arc<dyn VenueRecommender>,
    retry: RetryPolicy,
    epoch_policy: EpochPolicy,
    venue_timeout: Duration,
}

impl MatchCreator {
    pub fn new(
        store: Arc<dyn MatchStore>,
        authz: Arc<dyn Authorizer>,
        cache: CandidateCache,
        recommender: Arc<dyn VenueRecommender>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            authz,
            cache,
            recommender,
            retry: config.retry,
            epoch_policy: config.epoch_policy,
            venue_timeout: config.venue_timeout,
        }
    }

    /// Pair `first` and `second`. Order does not matter.
    pub async fn create(&self, first: GroupId, second: GroupId, signal: InterestSignal) -> EngineResult<MatchOutcome> {
        if first == second {
            return Err(EngineError::validation("a group cannot match with itself"));
        }

        if let Some(outcome) = self.existing(first, second).await? {
            return Ok(outcome);
        }

        let m = Match::new(first, second, signal.origin());
        let created = retry::with_backoff(&self.retry, "create match", || self.store.create_match_if_free(&m)).await;

        match created {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                // Lost the race; whoever won decides what we report.
                return match self.existing(first, second).await? {
                    Some(outcome) => Ok(outcome),
                    None => Err(Conflict::AlreadyMatched.into()),
                };
            }
            Err(StoreError::NotFound) => return Err(EngineError::NotFound("group")),
            Err(e) => return Err(e.into()),
        }

        info!(match_id = %m.id, "Match created between {} and {} ({})", first, second, m.origin);

        // A matched group vanishes from everyone else's pending queues.
        for group in [first, second] {
            if let Some(purged) = retry::best_effort(&self.retry, "purge pending invitations", || {
                self.store.purge_pending_invitations(group)
            })
            .await
            {
                if purged > 0 {
                    info!("Purged {} pending invitation(s) of newly matched group {}", purged, group);
                }
            }
        }

        self.cache.invalidate(&[first, second]).await;
        self.spawn_venue_suggestion(m.clone());

        Ok(MatchOutcome::Created(m))
    }

    /// `Some(Existing)` if the pair is already matched, `Err(AlreadyMatched)`
    /// if either group is matched to someone else.
    async fn existing(&self, first: GroupId, second: GroupId) -> EngineResult<Option<MatchOutcome>> {
        for group in [first, second] {
            if let Some(m) = self.store.find_match_for_group(group).await? {
                if m.pairs(first, second) {
                    return Ok(Some(MatchOutcome::Existing(m)));
                }
                return Err(Conflict::AlreadyMatched.into());
            }
        }
        Ok(None)
    }

    fn spawn_venue_suggestion(&self, m: Match) {
        if !self.recommender.enabled() {
            return;
        }
        let store = self.store.clone();
        let recommender = self.recommender.clone();
        let timeout = self.venue_timeout;
        tokio::spawn(async move {
            if let Err(e) = venue::suggest_for_match(store.as_ref(), recommender.as_ref(), &m, timeout).await {
                warn!("Venue suggestion for match {} failed, will retry later: {:#}", m.id, e);
            }
        });
    }

    /// Re-run the venue request for one match and wait for the answer.
    pub async fn retry_venue(&self, match_id: MatchId) -> EngineResult<Match> {
        let m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(Conflict::MatchNotFound)?;
        if !self.recommender.enabled() {
            return Ok(m);
        }
        match venue::suggest_for_match(self.store.as_ref(), self.recommender.as_ref(), &m, self.venue_timeout).await {
            Ok(Some(suggestion)) => Ok(Match { venue: Some(suggestion), ..m }),
            Ok(None) => Ok(m),
            Err(e) => {
                warn!("Venue retry for match {} failed: {:#}", match_id, e);
                Ok(m)
            }
        }
    }

    /// Attempt a suggestion for up to `limit` matches that still lack one.
    /// Returns how many were filled in.
    pub async fn fill_missing_venues(&self, limit: usize) -> EngineResult<usize> {
        if !self.recommender.enabled() {
            return Ok(0);
        }
        let pending = self.store.matches_missing_venue(limit).await?;
        let mut filled = 0;
        for m in &pending {
            match venue::suggest_for_match(self.store.as_ref(), self.recommender.as_ref(), m, self.venue_timeout).await {
                Ok(Some(_)) => filled += 1,
                Ok(None) => {}
                Err(e) => warn!("Venue retry for match {} failed: {:#}", m.id, e),
            }
        }
        Ok(filled)
    }

    /// End a match. Cleanup steps are best-effort and run first; releasing the
    /// match (record deleted, both flags cleared) is critical and retried.
    pub async fn end(&self, match_id: MatchId, acting_user: UserId) -> EngineResult<Match> {
        let m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(Conflict::MatchNotFound)?;

        let allowed = self.authz.is_admin(m.group_a, acting_user).await?
            || self.authz.is_admin(m.group_b, acting_user).await?;
        if !allowed {
            return Err(EngineError::forbidden("only a creator or admin of a paired group can end the match"));
        }

        let (a, b) = (m.group_a, m.group_b);

        retry::best_effort(&self.retry, "delete match chat", || self.store.delete_messages(match_id)).await;

        if self.epoch_policy == EpochPolicy::ResetOnTeardown {
            retry::best_effort(&self.retry, "clear decisions", || self.store.clear_decisions_between(a, b)).await;
            retry::best_effort(&self.retry, "clear likes", || self.store.clear_likes_between(a, b)).await;
        }

        retry::best_effort(&self.retry, "purge stale invitations", || self.store.purge_pending_between(a, b)).await;

        let released = retry::with_backoff(&self.retry, "release match", || self.store.release_match(match_id)).await?;
        let Some(released) = released else {
            return Err(Conflict::MatchNotFound.into());
        };

        self.cache.invalidate(&[a, b]).await;

        info!(match_id = %match_id, "Match between {} and {} ended by {}", a, b, acting_user);
        Ok(released)
    }
}
