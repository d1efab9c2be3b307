use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use pairup_types::models::{
    ChatMessage, Decision, Group, GroupId, Invitation, InvitationId, InvitationStatus, Like, Match,
    MatchId, Member, UserId, VenueSuggestion, Vote, VoteTally,
};

/// Uniform error type for all storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Backend failures may succeed on retry; everything else is an answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Final state written when an invitation leaves `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: InvitationStatus,
    pub responded_at: DateTime<Utc>,
    pub tally: Option<VoteTally>,
}

/// Persistence for groups, swipes, invitations and matches. Operations
/// documented as atomic perform their check and their write as one unit.
#[async_trait]
pub trait MatchStore: Send + Sync {
    // -- Groups --

    /// Insert a group together with its creating member.
    async fn create_group(&self, group: &Group, creator: &Member) -> StoreResult<()>;
    async fn get_group(&self, id: GroupId) -> StoreResult<Option<Group>>;
    /// Missing ids are skipped.
    async fn get_groups(&self, ids: &[GroupId]) -> StoreResult<Vec<Group>>;
    /// Open, unmatched, unretired groups other than `requester` that it has
    /// not decided on and holds no pending outgoing invitation to.
    ///
    /// Scans in id order starting just after `start_after` and wraps around
    /// to the lowest id, returning at most `limit`. Rotating `start_after`
    /// between calls lets a bounded scan reach every group over time.
    async fn list_available_groups(
        &self,
        requester: GroupId,
        start_after: GroupId,
        limit: usize,
    ) -> StoreResult<Vec<Group>>;
    async fn set_open_to_match(&self, id: GroupId, open: bool) -> StoreResult<()>;
    async fn set_decider(&self, id: GroupId, decider: UserId) -> StoreResult<()>;
    /// Marks the group retired and closes it to matching.
    async fn retire_group(&self, id: GroupId, at: DateTime<Utc>) -> StoreResult<()>;

    // -- Decisions --

    /// Insert unless a decision for the ordered pair exists. Returns whichever
    /// decision is stored afterwards.
    async fn put_decision(&self, decision: &Decision) -> StoreResult<Decision>;
    async fn decided_targets(&self, group: GroupId) -> StoreResult<Vec<GroupId>>;
    /// Both directions.
    async fn clear_decisions_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize>;

    // -- Likes --

    /// Idempotent.
    async fn put_like(&self, like: &Like) -> StoreResult<()>;
    async fn has_like(&self, from: GroupId, to: GroupId) -> StoreResult<bool>;
    /// Both directions.
    async fn clear_likes_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize>;

    // -- Invitations --

    /// Atomic: fails with `AlreadyExists` if a pending invitation between the
    /// two groups exists in either direction.
    async fn create_invitation(&self, invitation: &Invitation) -> StoreResult<()>;
    async fn get_invitation(&self, id: InvitationId) -> StoreResult<Option<Invitation>>;
    async fn list_pending_invitations(&self, group: GroupId, direction: Direction) -> StoreResult<Vec<Invitation>>;
    /// `Conflict` if the invitation is no longer pending.
    async fn update_tally(&self, id: InvitationId, tally: VoteTally) -> StoreResult<()>;
    /// Atomic compare-and-set from `pending`. Returns true only for the caller
    /// whose write moved the invitation out of `pending`.
    async fn resolve_invitation(&self, id: InvitationId, resolution: &Resolution) -> StoreResult<bool>;
    /// Atomic compare-and-set from `accepted` back to `pending`, clearing
    /// `responded_at`. Undoes an acceptance that no match could back.
    async fn reopen_invitation(&self, id: InvitationId) -> StoreResult<bool>;
    /// Deletes the invitation and its votes.
    async fn delete_invitation(&self, id: InvitationId) -> StoreResult<bool>;
    /// Deletes every pending invitation sent or received by `group`, with votes.
    async fn purge_pending_invitations(&self, group: GroupId) -> StoreResult<usize>;
    /// Deletes pending invitations between the pair, either direction, with votes.
    async fn purge_pending_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize>;

    // -- Votes --

    /// Atomic: `AlreadyExists` for a second vote by the same voter, `Conflict`
    /// if the invitation is not pending, `NotFound` if it is gone.
    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()>;
    async fn list_votes(&self, invitation: InvitationId) -> StoreResult<Vec<Vote>>;
    async fn delete_votes(&self, invitation: InvitationId) -> StoreResult<usize>;

    // -- Matches --

    /// Atomic: verifies neither group is in a live match, inserts the record
    /// and sets `has_active_match` on both groups. `Conflict` otherwise.
    async fn create_match_if_free(&self, m: &Match) -> StoreResult<()>;
    async fn get_match(&self, id: MatchId) -> StoreResult<Option<Match>>;
    async fn find_match_for_group(&self, group: GroupId) -> StoreResult<Option<Match>>;
    async fn set_venue(&self, id: MatchId, venue: &VenueSuggestion) -> StoreResult<()>;
    /// Stamp the latest suggestion attempt for a match.
    async fn mark_venue_attempt(&self, id: MatchId, at: DateTime<Utc>) -> StoreResult<()>;
    /// Live matches without a venue: never attempted first, then least
    /// recently attempted, then oldest.
    async fn matches_missing_venue(&self, limit: usize) -> StoreResult<Vec<Match>>;
    /// Atomic: deletes the record and clears `has_active_match` on both groups.
    /// Returns `None` when the match was already gone.
    async fn release_match(&self, id: MatchId) -> StoreResult<Option<Match>>;

    // -- Match chat --

    async fn insert_message(&self, message: &ChatMessage) -> StoreResult<()>;
    /// Newest first.
    async fn list_messages(&self, match_id: MatchId, limit: usize) -> StoreResult<Vec<ChatMessage>>;
    async fn delete_messages(&self, match_id: MatchId) -> StoreResult<usize>;
}

/// Live membership. Never cached: vote tallies depend on the current roster.
#[async_trait]
pub trait Membership: Send + Sync {
    async fn member_count(&self, group: GroupId) -> StoreResult<u32>;
    /// Oldest member first.
    async fn members(&self, group: GroupId) -> StoreResult<Vec<Member>>;
    async fn member(&self, group: GroupId, user: UserId) -> StoreResult<Option<Member>>;
    /// `AlreadyExists` if the user is already a member.
    async fn add_member(&self, member: &Member) -> StoreResult<()>;
    /// Returns the remaining member count. `NotFound` if not a member.
    async fn remove_member(&self, group: GroupId, user: UserId) -> StoreResult<u32>;
}
