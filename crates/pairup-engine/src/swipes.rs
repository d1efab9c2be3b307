use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use pairup_types::models::{Decision, DecisionKind, GroupId, Like, Match};

use crate::cache::CandidateCache;
use crate::error::{Conflict, EngineError, EngineResult};
use crate::matcher::{InterestSignal, MatchCreator};
use crate::store::MatchStore;

#[derive(Debug, Clone, PartialEq)]
pub struct SwipeOutcome {
    pub decision: DecisionKind,
    /// Both groups have liked each other.
    pub mutual: bool,
    pub matched: Option<Match>,
}

/// Records yes/no decisions and detects mutual likes.
pub struct SwipeRecorder {
    store: Arc<dyn MatchStore>,
    cache: CandidateCache,
    matcher: Arc<MatchCreator>,
}

impl SwipeRecorder {
    pub fn new(store: Arc<dyn MatchStore>, cache: CandidateCache, matcher: Arc<MatchCreator>) -> Self {
        Self { store, cache, matcher }
    }

    /// Idempotent per ordered pair: repeating the same decision changes
    /// nothing, a different one is a conflict.
    pub async fn record(&self, group_id: GroupId, target_id: GroupId, decision: DecisionKind) -> EngineResult<SwipeOutcome> {
        if decision == DecisionKind::RejectedByOther {
            return Err(EngineError::validation("decision must be yes or no"));
        }
        if group_id == target_id {
            return Err(EngineError::validation("a group cannot decide on itself"));
        }

        let group = self.store.get_group(group_id).await?.ok_or(EngineError::NotFound("group"))?;
        let target = self.store.get_group(target_id).await?.ok_or(EngineError::NotFound("target group"))?;
        if group.has_active_match {
            return Err(Conflict::AlreadyMatched.into());
        }
        if target.retired_at.is_some() {
            return Err(EngineError::validation("target group is no longer active"));
        }

        let stored = self
            .store
            .put_decision(&Decision {
                group_id,
                target_id,
                kind: decision,
                created_at: Utc::now(),
            })
            .await?;
        if stored.kind != decision {
            return Err(Conflict::AlreadyDecided.into());
        }
        self.cache.invalidate(&[group_id]).await;

        match decision {
            DecisionKind::Yes => self.record_like(group_id, target_id).await,
            _ => {
                // The rejected group must not see the rejecting one again either.
                self.store
                    .put_decision(&Decision {
                        group_id: target_id,
                        target_id: group_id,
                        kind: DecisionKind::RejectedByOther,
                        created_at: Utc::now(),
                    })
                    .await?;
                self.cache.invalidate(&[target_id]).await;
                debug!("Group {} passed on {}", group_id, target_id);
                Ok(SwipeOutcome { decision, mutual: false, matched: None })
            }
        }
    }

    async fn record_like(&self, group_id: GroupId, target_id: GroupId) -> EngineResult<SwipeOutcome> {
        self.store
            .put_like(&Like {
                from_group: group_id,
                to_group: target_id,
                created_at: Utc::now(),
            })
            .await?;

        let mutual = self.store.has_like(target_id, group_id).await?;
        if !mutual {
            return Ok(SwipeOutcome { decision: DecisionKind::Yes, mutual: false, matched: None });
        }

        info!("Mutual like between {} and {}", group_id, target_id);

        let outcome = self.matcher.create(group_id, target_id, InterestSignal::MutualLike).await?;
        Ok(SwipeOutcome {
            decision: DecisionKind::Yes,
            mutual: true,
            matched: Some(outcome.into_match()),
        })
    }
}
