//! [`MatchStore`] and [`Membership`] over [`Database`].
//!
//! rusqlite is blocking, so every call hops onto the blocking pool. Errors
//! from SQLite become `StoreError::Backend`, which the engine retries.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;

use pairup_engine::store::{Direction, MatchStore, Membership, Resolution, StoreError, StoreResult};
use pairup_types::models::{
    ChatMessage, Decision, Group, GroupId, Invitation, InvitationId, Like, Match, MatchId, Member, UserId,
    VenueSuggestion, Vote, VoteTally,
};

use crate::Database;
use crate::queries::WriteOutcome;

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(Database::open(path)?)))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                StoreError::Backend(format!("blocking task failed: {}", e))
            })?
            .map_err(|e| StoreError::Backend(format!("{:#}", e)))
    }
}

fn outcome(result: WriteOutcome) -> StoreResult<()> {
    match result {
        WriteOutcome::Done => Ok(()),
        WriteOutcome::Exists => Err(StoreError::AlreadyExists),
        WriteOutcome::Conflict => Err(StoreError::Conflict),
        WriteOutcome::Missing => Err(StoreError::NotFound),
    }
}

fn found(updated: bool) -> StoreResult<()> {
    if updated { Ok(()) } else { Err(StoreError::NotFound) }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn create_group(&self, group: &Group, creator: &Member) -> StoreResult<()> {
        let (group, creator) = (group.clone(), creator.clone());
        outcome(self.run(move |db| db.create_group(&group, &creator)).await?)
    }

    async fn get_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        self.run(move |db| db.get_group(id)).await
    }

    async fn get_groups(&self, ids: &[GroupId]) -> StoreResult<Vec<Group>> {
        let ids = ids.to_vec();
        self.run(move |db| db.get_groups(&ids)).await
    }

    async fn list_available_groups(
        &self,
        requester: GroupId,
        start_after: GroupId,
        limit: usize,
    ) -> StoreResult<Vec<Group>> {
        self.run(move |db| db.list_available_groups(requester, start_after, limit)).await
    }

    async fn set_open_to_match(&self, id: GroupId, open: bool) -> StoreResult<()> {
        found(self.run(move |db| db.set_open_to_match(id, open)).await?)
    }

    async fn set_decider(&self, id: GroupId, decider: UserId) -> StoreResult<()> {
        found(self.run(move |db| db.set_decider(id, decider)).await?)
    }

    async fn retire_group(&self, id: GroupId, at: DateTime<Utc>) -> StoreResult<()> {
        found(self.run(move |db| db.retire_group(id, at)).await?)
    }

    async fn put_decision(&self, decision: &Decision) -> StoreResult<Decision> {
        let decision = decision.clone();
        self.run(move |db| db.put_decision(&decision)).await
    }

    async fn decided_targets(&self, group: GroupId) -> StoreResult<Vec<GroupId>> {
        self.run(move |db| db.decided_targets(group)).await
    }

    async fn clear_decisions_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize> {
        self.run(move |db| db.clear_decisions_between(a, b)).await
    }

    async fn put_like(&self, like: &Like) -> StoreResult<()> {
        let like = like.clone();
        self.run(move |db| db.put_like(&like)).await
    }

    async fn has_like(&self, from: GroupId, to: GroupId) -> StoreResult<bool> {
        self.run(move |db| db.has_like(from, to)).await
    }

    async fn clear_likes_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize> {
        self.run(move |db| db.clear_likes_between(a, b)).await
    }

    async fn create_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        let invitation = invitation.clone();
        outcome(self.run(move |db| db.create_invitation(&invitation)).await?)
    }

    async fn get_invitation(&self, id: InvitationId) -> StoreResult<Option<Invitation>> {
        self.run(move |db| db.get_invitation(id)).await
    }

    async fn list_pending_invitations(&self, group: GroupId, direction: Direction) -> StoreResult<Vec<Invitation>> {
        self.run(move |db| db.list_pending_invitations(group, direction)).await
    }

    async fn update_tally(&self, id: InvitationId, tally: VoteTally) -> StoreResult<()> {
        outcome(self.run(move |db| db.update_tally(id, tally)).await?)
    }

    async fn resolve_invitation(&self, id: InvitationId, resolution: &Resolution) -> StoreResult<bool> {
        let resolution = resolution.clone();
        self.run(move |db| db.resolve_invitation(id, &resolution)).await
    }

    async fn reopen_invitation(&self, id: InvitationId) -> StoreResult<bool> {
        self.run(move |db| db.reopen_invitation(id)).await
    }

    async fn delete_invitation(&self, id: InvitationId) -> StoreResult<bool> {
        self.run(move |db| db.delete_invitation(id)).await
    }

    async fn purge_pending_invitations(&self, group: GroupId) -> StoreResult<usize> {
        self.run(move |db| db.purge_pending_invitations(group)).await
    }

    async fn purge_pending_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize> {
        self.run(move |db| db.purge_pending_between(a, b)).await
    }

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()> {
        let vote = vote.clone();
        outcome(self.run(move |db| db.insert_vote(&vote)).await?)
    }

    async fn list_votes(&self, invitation: InvitationId) -> StoreResult<Vec<Vote>> {
        self.run(move |db| db.list_votes(invitation)).await
    }

    async fn delete_votes(&self, invitation: InvitationId) -> StoreResult<usize> {
        self.run(move |db| db.delete_votes(invitation)).await
    }

    async fn create_match_if_free(&self, m: &Match) -> StoreResult<()> {
        let m = m.clone();
        outcome(self.run(move |db| db.create_match_if_free(&m)).await?)
    }

    async fn get_match(&self, id: MatchId) -> StoreResult<Option<Match>> {
        self.run(move |db| db.get_match(id)).await
    }

    async fn find_match_for_group(&self, group: GroupId) -> StoreResult<Option<Match>> {
        self.run(move |db| db.find_match_for_group(group)).await
    }

    async fn set_venue(&self, id: MatchId, venue: &VenueSuggestion) -> StoreResult<()> {
        let venue = venue.clone();
        found(self.run(move |db| db.set_venue(id, &venue)).await?)
    }

    async fn mark_venue_attempt(&self, id: MatchId, at: DateTime<Utc>) -> StoreResult<()> {
        found(self.run(move |db| db.mark_venue_attempt(id, at)).await?)
    }

    async fn matches_missing_venue(&self, limit: usize) -> StoreResult<Vec<Match>> {
        self.run(move |db| db.matches_missing_venue(limit)).await
    }

    async fn release_match(&self, id: MatchId) -> StoreResult<Option<Match>> {
        self.run(move |db| db.release_match(id)).await
    }

    async fn insert_message(&self, message: &ChatMessage) -> StoreResult<()> {
        let message = message.clone();
        outcome(self.run(move |db| db.insert_message(&message)).await?)
    }

    async fn list_messages(&self, match_id: MatchId, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        self.run(move |db| db.list_messages(match_id, limit)).await
    }

    async fn delete_messages(&self, match_id: MatchId) -> StoreResult<usize> {
        self.run(move |db| db.delete_messages(match_id)).await
    }
}

#[async_trait]
impl Membership for SqliteStore {
    async fn member_count(&self, group: GroupId) -> StoreResult<u32> {
        self.run(move |db| db.member_count(group)).await
    }

    async fn members(&self, group: GroupId) -> StoreResult<Vec<Member>> {
        self.run(move |db| db.members(group)).await
    }

    async fn member(&self, group: GroupId, user: UserId) -> StoreResult<Option<Member>> {
        self.run(move |db| db.member(group, user)).await
    }

    async fn add_member(&self, member: &Member) -> StoreResult<()> {
        let member = member.clone();
        outcome(self.run(move |db| db.add_member(&member)).await?)
    }

    async fn remove_member(&self, group: GroupId, user: UserId) -> StoreResult<u32> {
        self.run(move |db| db.remove_member(group, user))
            .await?
            .ok_or(StoreError::NotFound)
    }
}
