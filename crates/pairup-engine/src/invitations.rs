use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use pairup_types::models::{
    GovernanceMode, GroupId, Invitation, InvitationId, InvitationStatus, Match, UserId, VoteChoice, VoteTally,
};

use crate::cache::CandidateCache;
use crate::error::{Conflict, EngineError, EngineResult};
use crate::governance::{Consensus, Governance, InvitationAction, SingleDecider, Verdict};
use crate::matcher::{InterestSignal, MatchCreator};
use crate::retry::{self, RetryPolicy};
use crate::store::{Direction, MatchStore, Resolution, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct InvitationOutcome {
    pub invitation: Invitation,
    pub matched: Option<Match>,
}

pub struct InvitationManager {
    store: Arc<dyn MatchStore>,
    cache: CandidateCache,
    matcher: Arc<MatchCreator>,
    single: SingleDecider,
    consensus: Consensus,
    retry: RetryPolicy,
}

impl InvitationManager {
    pub fn new(
        store: Arc<dyn MatchStore>,
        cache: CandidateCache,
        matcher: Arc<MatchCreator>,
        single: SingleDecider,
        consensus: Consensus,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            cache,
            matcher,
            single,
            consensus,
            retry,
        }
    }

    fn governance(&self, mode: GovernanceMode) -> &dyn Governance {
        match mode {
            GovernanceMode::SingleDecider => &self.single,
            GovernanceMode::Consensus => &self.consensus,
        }
    }

    pub async fn create(&self, from: GroupId, to: GroupId) -> EngineResult<Invitation> {
        if from == to {
            return Err(EngineError::validation("a group cannot invite itself"));
        }

        let sender = self.store.get_group(from).await?.ok_or(EngineError::NotFound("group"))?;
        let receiver = self.store.get_group(to).await?.ok_or(EngineError::NotFound("invited group"))?;

        if sender.has_active_match || receiver.has_active_match {
            return Err(Conflict::AlreadyMatched.into());
        }
        if sender.retired_at.is_some() || receiver.retired_at.is_some() || !receiver.open_to_match {
            return Err(EngineError::validation("invited group is not open to matching"));
        }

        let invitation = Invitation::new(from, to, receiver.governance);
        match self.store.create_invitation(&invitation).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => return Err(Conflict::InvitationExists.into()),
            Err(e) => return Err(e.into()),
        }
        self.cache.invalidate(&[from]).await;

        info!(invitation_id = %invitation.id, "Group {} invited {} ({})", from, to, receiver.governance);
        Ok(invitation)
    }

    pub async fn list_pending(&self, group: GroupId, direction: Direction) -> EngineResult<Vec<Invitation>> {
        Ok(self.store.list_pending_invitations(group, direction).await?)
    }

    /// Single-decider answer.
    pub async fn respond(&self, id: InvitationId, choice: VoteChoice, acting_user: UserId) -> EngineResult<InvitationOutcome> {
        self.act(id, InvitationAction::Respond { user: acting_user, choice }).await
    }

    /// Consensus ballot.
    pub async fn vote(
        &self,
        id: InvitationId,
        voter: UserId,
        voter_name: &str,
        choice: VoteChoice,
    ) -> EngineResult<InvitationOutcome> {
        self.act(
            id,
            InvitationAction::Vote {
                voter,
                voter_name: voter_name.to_string(),
                choice,
            },
        )
        .await
    }

    async fn act(&self, id: InvitationId, action: InvitationAction) -> EngineResult<InvitationOutcome> {
        let invitation = self
            .store
            .get_invitation(id)
            .await?
            .ok_or(EngineError::NotFound("invitation"))?;
        if invitation.status != InvitationStatus::Pending {
            return Err(Conflict::InvitationResolved.into());
        }

        let receiver = self
            .store
            .get_group(invitation.to_group)
            .await?
            .ok_or(EngineError::NotFound("invited group"))?;

        if action.choice() == VoteChoice::Accept {
            self.ensure_unmatched(&invitation).await?;
        }

        let governance = self.governance(receiver.governance);
        let verdict = governance.resolve(&invitation, &action).await?;
        self.apply(invitation, governance, verdict).await
    }

    /// Never honour an accept for a group that is already matched.
    async fn ensure_unmatched(&self, invitation: &Invitation) -> EngineResult<()> {
        let groups = self.store.get_groups(&[invitation.from_group, invitation.to_group]).await?;
        if groups.len() < 2 {
            return Err(EngineError::NotFound("group"));
        }
        if groups.iter().any(|g| g.has_active_match) {
            warn!("Invitation {} is stale: a group in it already has a match", invitation.id);
            return Err(Conflict::AlreadyMatched.into());
        }
        Ok(())
    }

    async fn apply(
        &self,
        mut invitation: Invitation,
        governance: &dyn Governance,
        verdict: Verdict,
    ) -> EngineResult<InvitationOutcome> {
        let (status, tally) = match verdict {
            Verdict::Pending(tally) => {
                match self.store.update_tally(invitation.id, tally).await {
                    Ok(()) => {}
                    Err(StoreError::Conflict | StoreError::NotFound) => return Err(Conflict::InvitationResolved.into()),
                    Err(e) => return Err(e.into()),
                }
                invitation.tally = Some(tally);
                return Ok(InvitationOutcome { invitation, matched: None });
            }
            Verdict::Accept(tally) => (InvitationStatus::Accepted, tally),
            Verdict::Reject(tally) => (InvitationStatus::Rejected, tally),
        };

        self.finalize(invitation, governance, status, tally).await
    }

    async fn finalize(
        &self,
        mut invitation: Invitation,
        governance: &dyn Governance,
        status: InvitationStatus,
        tally: Option<VoteTally>,
    ) -> EngineResult<InvitationOutcome> {
        let id = invitation.id;
        let resolution = Resolution {
            status,
            responded_at: Utc::now(),
            tally,
        };

        let won = retry::with_backoff(&self.retry, "resolve invitation", || {
            self.store.resolve_invitation(id, &resolution)
        })
        .await?;
        if !won {
            info!("Invitation {} was already resolved by a concurrent action", id);
            return Err(Conflict::InvitationResolved.into());
        }

        invitation.status = status;
        invitation.responded_at = Some(resolution.responded_at);
        if tally.is_some() {
            invitation.tally = tally;
        }

        let mut matched = None;
        if status == InvitationStatus::Accepted {
            let signal = InterestSignal::InvitationAccepted(id);
            match self.matcher.create(invitation.from_group, invitation.to_group, signal).await {
                Ok(outcome) => matched = Some(outcome.into_match()),
                Err(EngineError::Conflict(Conflict::AlreadyMatched)) => {
                    warn!("Invitation {} accepted, but a group matched elsewhere first", id);
                    retry::best_effort(&self.retry, "delete superseded invitation", || {
                        self.store.delete_invitation(id)
                    })
                    .await;
                    return Err(Conflict::AlreadyMatched.into());
                }
                Err(e) => {
                    self.reopen(id).await;
                    return Err(e);
                }
            }
        }

        if !governance.retains_resolved() {
            retry::best_effort(&self.retry, "delete resolved invitation", || self.store.delete_invitation(id)).await;
        }

        info!(
            invitation_id = %id,
            "Invitation from {} to {} {} ({})",
            invitation.from_group,
            invitation.to_group,
            status,
            governance.mode()
        );
        Ok(InvitationOutcome { invitation, matched })
    }

    /// Put an acceptance whose match could not be created back to pending so
    /// the receiving group can act on it again. Votes are still in place.
    async fn reopen(&self, id: InvitationId) {
        match retry::with_backoff(&self.retry, "reopen invitation", || self.store.reopen_invitation(id)).await {
            Ok(true) => warn!("Match creation for invitation {} failed, invitation reopened", id),
            Ok(false) => warn!("Match creation for invitation {} failed and it was no longer accepted", id),
            Err(e) => error!("Invitation {} is accepted without a match and could not be reopened: {}", id, e),
        }
    }

    /// Re-tally every pending incoming invitation of a consensus group, e.g.
    /// after a member left. Returns how many were resolved.
    pub async fn reevaluate(&self, group_id: GroupId) -> EngineResult<usize> {
        let Some(group) = self.store.get_group(group_id).await? else {
            return Ok(0);
        };
        if group.governance != GovernanceMode::Consensus {
            return Ok(0);
        }

        let pending = self.store.list_pending_invitations(group_id, Direction::Incoming).await?;
        let mut resolved = 0;
        for invitation in pending {
            let id = invitation.id;
            let verdict = self.consensus.tally(&invitation).await?;
            if matches!(verdict, Verdict::Accept(_)) && self.ensure_unmatched(&invitation).await.is_err() {
                continue;
            }
            match self.apply(invitation, &self.consensus, verdict).await {
                Ok(outcome) if outcome.invitation.status != InvitationStatus::Pending => resolved += 1,
                Ok(_) => {}
                Err(EngineError::Conflict(c)) => info!("Re-tally of invitation {} skipped: {}", id, c),
                Err(e) => warn!("Re-tally of invitation {} failed: {}", id, e),
            }
        }
        Ok(resolved)
    }
}
