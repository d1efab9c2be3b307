use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use pairup_types::models::{GovernanceMode, Invitation, UserId, Vote, VoteChoice, VoteTally};

use crate::authz::Authorizer;
use crate::error::{Conflict, EngineError, EngineResult};
use crate::store::{MatchStore, Membership, StoreError};

/// Something a member of the receiving group did about an invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationAction {
    /// Single-decider answer.
    Respond { user: UserId, choice: VoteChoice },
    /// Consensus ballot.
    Vote {
        voter: UserId,
        voter_name: String,
        choice: VoteChoice,
    },
}

impl InvitationAction {
    pub fn choice(&self) -> VoteChoice {
        match self {
            InvitationAction::Respond { choice, .. } | InvitationAction::Vote { choice, .. } => *choice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept(Option<VoteTally>),
    Reject(Option<VoteTally>),
    /// Not decided yet; carries the updated tally.
    Pending(VoteTally),
}

#[async_trait]
pub trait Governance: Send + Sync {
    fn mode(&self) -> GovernanceMode;

    /// Whether a resolved invitation is kept as a record. When false the
    /// invitation and its votes are deleted once resolved.
    fn retains_resolved(&self) -> bool;

    async fn resolve(&self, invitation: &Invitation, action: &InvitationAction) -> EngineResult<Verdict>;
}

pub struct SingleDecider {
    authz: Arc<dyn Authorizer>,
}

impl SingleDecider {
    pub fn new(authz: Arc<dyn Authorizer>) -> Self {
        Self { authz }
    }
}

#[async_trait]
impl Governance for SingleDecider {
    fn mode(&self) -> GovernanceMode {
        GovernanceMode::SingleDecider
    }

    fn retains_resolved(&self) -> bool {
        true
    }

    async fn resolve(&self, invitation: &Invitation, action: &InvitationAction) -> EngineResult<Verdict> {
        let InvitationAction::Respond { user, choice } = action else {
            return Err(EngineError::validation(
                "this group decides through a single decider; respond instead of voting",
            ));
        };

        if !self.authz.is_decider(invitation.to_group, *user).await? {
            return Err(EngineError::forbidden("only the group's decider can respond to invitations"));
        }

        Ok(match choice {
            VoteChoice::Accept => Verdict::Accept(None),
            VoteChoice::Reject => Verdict::Reject(None),
        })
    }
}

/// Votes needed to accept: strictly more than half, so ties reject.
pub fn majority_threshold(member_count: u32) -> u32 {
    member_count / 2 + 1
}

/// Pure tally rule. Resolves only once everyone currently in the group has
/// voted; the outcome is then decided by strict majority.
pub fn decide(member_count: u32, accept_votes: u32, reject_votes: u32) -> Verdict {
    let total_votes = accept_votes + reject_votes;
    let vote_complete = total_votes >= member_count;
    let tally = VoteTally {
        total_votes,
        accept_votes,
        reject_votes,
        vote_complete,
    };

    if !vote_complete {
        Verdict::Pending(tally)
    } else if accept_votes >= majority_threshold(member_count) {
        Verdict::Accept(Some(tally))
    } else {
        Verdict::Reject(Some(tally))
    }
}

pub struct Consensus {
    store: Arc<dyn MatchStore>,
    members: Arc<dyn Membership>,
}

impl Consensus {
    pub fn new(store: Arc<dyn MatchStore>, members: Arc<dyn Membership>) -> Self {
        Self { store, members }
    }

    /// Recount against the receiving group's current roster. Ballots from
    /// members who have left no longer count.
    pub async fn tally(&self, invitation: &Invitation) -> EngineResult<Verdict> {
        let roster: HashSet<UserId> = self
            .members
            .members(invitation.to_group)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        let votes = self.store.list_votes(invitation.id).await?;

        let (mut accept, mut reject) = (0, 0);
        for vote in votes.iter().filter(|v| roster.contains(&v.voter_id)) {
            match vote.choice {
                VoteChoice::Accept => accept += 1,
                VoteChoice::Reject => reject += 1,
            }
        }

        Ok(decide(roster.len() as u32, accept, reject))
    }
}

#[async_trait]
impl Governance for Consensus {
    fn mode(&self) -> GovernanceMode {
        GovernanceMode::Consensus
    }

    fn retains_resolved(&self) -> bool {
        false
    }

    async fn resolve(&self, invitation: &Invitation, action: &InvitationAction) -> EngineResult<Verdict> {
        let InvitationAction::Vote { voter, voter_name, choice } = action else {
            return Err(EngineError::validation("this group decides by vote; cast a vote instead"));
        };

        if self.members.member(invitation.to_group, *voter).await?.is_none() {
            return Err(EngineError::validation("voter is not a member of the invited group"));
        }

        let vote = Vote {
            invitation_id: invitation.id,
            voter_id: *voter,
            voter_name: voter_name.clone(),
            choice: *choice,
            created_at: Utc::now(),
        };

        match self.store.insert_vote(&vote).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                // A complete tally still pending means an earlier finalize
                // was rolled back; a repeat ballot applies it again.
                return match self.tally(invitation).await? {
                    Verdict::Pending(_) => Err(Conflict::DuplicateVote.into()),
                    verdict => Ok(verdict),
                };
            }
            Err(StoreError::Conflict | StoreError::NotFound) => return Err(Conflict::InvitationResolved.into()),
            Err(e) => return Err(e.into()),
        }

        self.tally(invitation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_majority_threshold() {
        assert_eq!(majority_threshold(1), 1);
        assert_eq!(majority_threshold(4), 3);
        assert_eq!(majority_threshold(5), 3);
        assert_eq!(majority_threshold(6), 4);
    }

    #[test]
    fn waits_for_full_participation() {
        // Three of five accepting is a majority, but two members haven't voted.
        let verdict = decide(5, 3, 0);
        assert_eq!(
            verdict,
            Verdict::Pending(VoteTally {
                total_votes: 3,
                accept_votes: 3,
                reject_votes: 0,
                vote_complete: false,
            })
        );
    }

    #[test]
    fn majority_accepts_once_everyone_voted() {
        assert!(matches!(decide(5, 3, 2), Verdict::Accept(Some(t)) if t.vote_complete));
    }

    #[test]
    fn tie_rejects() {
        assert!(matches!(decide(4, 2, 2), Verdict::Reject(Some(_))));
    }

    #[test]
    fn shrinking_roster_can_complete_a_vote() {
        // Three accepts were cast in a group that has since shrunk to three.
        assert!(matches!(decide(3, 3, 0), Verdict::Accept(_)));
    }
}
