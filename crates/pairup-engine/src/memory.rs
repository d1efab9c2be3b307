use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pairup_types::models::{
    ChatMessage, Decision, Group, GroupId, Invitation, InvitationId, InvitationStatus, Like, Match,
    MatchId, Member, UserId, VenueSuggestion, Vote, VoteTally,
};

use crate::store::{Direction, MatchStore, Membership, Resolution, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    groups: HashMap<GroupId, Group>,
    members: HashMap<GroupId, Vec<Member>>,
    decisions: HashMap<(GroupId, GroupId), Decision>,
    likes: HashMap<(GroupId, GroupId), Like>,
    invitations: HashMap<InvitationId, Invitation>,
    votes: HashMap<InvitationId, Vec<Vote>>,
    matches: HashMap<MatchId, Match>,
    venue_attempts: HashMap<MatchId, DateTime<Utc>>,
    messages: HashMap<MatchId, Vec<ChatMessage>>,
}

impl Tables {
    fn live_match_for(&self, group: GroupId) -> Option<&Match> {
        self.matches.values().find(|m| m.involves(group))
    }

    fn delete_invitations_where(&mut self, pred: impl Fn(&Invitation) -> bool) -> usize {
        let doomed: Vec<InvitationId> = self
            .invitations
            .values()
            .filter(|inv| inv.status == InvitationStatus::Pending && pred(inv))
            .map(|inv| inv.id)
            .collect();
        for id in &doomed {
            self.invitations.remove(id);
            self.votes.remove(id);
        }
        doomed.len()
    }

    fn group_mut(&mut self, id: GroupId) -> StoreResult<&mut Group> {
        self.groups.get_mut(&id).ok_or(StoreError::NotFound)
    }
}

/// In-process backend. Every operation takes the single table lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Operation name -> number of upcoming calls that should fail.
    faults: Mutex<HashMap<&'static str, u32>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `operation` fail with a backend error.
    /// Used to exercise retry and best-effort paths.
    pub fn inject_failures(&self, operation: &'static str, times: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(operation, times);
        }
    }

    /// Make every later call of `operation` sleep for `delay` before it runs.
    pub fn inject_delay(&self, operation: &'static str, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(operation, delay);
        }
    }

    async fn stall(&self, operation: &'static str) {
        let delay = self.delays.lock().ok().and_then(|d| d.get(operation).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_fault(&self, operation: &'static str) -> StoreResult<()> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|e| StoreError::Backend(format!("fault table poisoned: {}", e)))?;
        match faults.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Backend(format!("injected failure in {}", operation)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn create_group(&self, group: &Group, creator: &Member) -> StoreResult<()> {
        self.check_fault("create_group")?;
        let mut t = self.tables.write().await;
        if t.groups.contains_key(&group.id) {
            return Err(StoreError::AlreadyExists);
        }
        let mut group = group.clone();
        group.member_count = 1;
        t.groups.insert(group.id, group);
        t.members.insert(creator.group_id, vec![creator.clone()]);
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> StoreResult<Option<Group>> {
        self.check_fault("get_group")?;
        Ok(self.tables.read().await.groups.get(&id).cloned())
    }

    async fn get_groups(&self, ids: &[GroupId]) -> StoreResult<Vec<Group>> {
        self.check_fault("get_groups")?;
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.groups.get(id).cloned()).collect())
    }

    async fn list_available_groups(
        &self,
        requester: GroupId,
        start_after: GroupId,
        limit: usize,
    ) -> StoreResult<Vec<Group>> {
        self.check_fault("list_available_groups")?;
        self.stall("list_available_groups").await;
        let t = self.tables.read().await;
        let mut groups: Vec<Group> = t
            .groups
            .values()
            .filter(|g| g.is_available() && g.id != requester)
            .filter(|g| !t.decisions.contains_key(&(requester, g.id)))
            .filter(|g| {
                !t.invitations.values().any(|inv| {
                    inv.status == InvitationStatus::Pending && inv.from_group == requester && inv.to_group == g.id
                })
            })
            .cloned()
            .collect();
        groups.sort_by_key(|g| (g.id <= start_after, g.id));
        groups.truncate(limit);
        Ok(groups)
    }

    async fn set_open_to_match(&self, id: GroupId, open: bool) -> StoreResult<()> {
        self.check_fault("set_open_to_match")?;
        self.tables.write().await.group_mut(id)?.open_to_match = open;
        Ok(())
    }

    async fn set_decider(&self, id: GroupId, decider: UserId) -> StoreResult<()> {
        self.check_fault("set_decider")?;
        self.tables.write().await.group_mut(id)?.decider_id = decider;
        Ok(())
    }

    async fn retire_group(&self, id: GroupId, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_fault("retire_group")?;
        let mut t = self.tables.write().await;
        let group = t.group_mut(id)?;
        group.retired_at = Some(at);
        group.open_to_match = false;
        Ok(())
    }

    async fn put_decision(&self, decision: &Decision) -> StoreResult<Decision> {
        self.check_fault("put_decision")?;
        let mut t = self.tables.write().await;
        let stored = t
            .decisions
            .entry((decision.group_id, decision.target_id))
            .or_insert_with(|| decision.clone());
        Ok(stored.clone())
    }

    async fn decided_targets(&self, group: GroupId) -> StoreResult<Vec<GroupId>> {
        self.check_fault("decided_targets")?;
        let t = self.tables.read().await;
        Ok(t.decisions.keys().filter(|(from, _)| *from == group).map(|(_, to)| *to).collect())
    }

    async fn clear_decisions_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize> {
        self.check_fault("clear_decisions_between")?;
        let mut t = self.tables.write().await;
        let removed = [t.decisions.remove(&(a, b)), t.decisions.remove(&(b, a))];
        Ok(removed.iter().filter(|d| d.is_some()).count())
    }

    async fn put_like(&self, like: &Like) -> StoreResult<()> {
        self.check_fault("put_like")?;
        let mut t = self.tables.write().await;
        t.likes.entry((like.from_group, like.to_group)).or_insert_with(|| like.clone());
        Ok(())
    }

    async fn has_like(&self, from: GroupId, to: GroupId) -> StoreResult<bool> {
        self.check_fault("has_like")?;
        Ok(self.tables.read().await.likes.contains_key(&(from, to)))
    }

    async fn clear_likes_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize> {
        self.check_fault("clear_likes_between")?;
        let mut t = self.tables.write().await;
        let removed = [t.likes.remove(&(a, b)), t.likes.remove(&(b, a))];
        Ok(removed.iter().filter(|l| l.is_some()).count())
    }

    async fn create_invitation(&self, invitation: &Invitation) -> StoreResult<()> {
        self.check_fault("create_invitation")?;
        let mut t = self.tables.write().await;
        let duplicate = t.invitations.values().any(|inv| {
            inv.status == InvitationStatus::Pending
                && inv.involves(invitation.from_group)
                && inv.involves(invitation.to_group)
        });
        if duplicate {
            return Err(StoreError::AlreadyExists);
        }
        t.invitations.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn get_invitation(&self, id: InvitationId) -> StoreResult<Option<Invitation>> {
        self.check_fault("get_invitation")?;
        Ok(self.tables.read().await.invitations.get(&id).cloned())
    }

    async fn list_pending_invitations(&self, group: GroupId, direction: Direction) -> StoreResult<Vec<Invitation>> {
        self.check_fault("list_pending_invitations")?;
        let t = self.tables.read().await;
        let mut list: Vec<Invitation> = t
            .invitations
            .values()
            .filter(|inv| inv.status == InvitationStatus::Pending)
            .filter(|inv| match direction {
                Direction::Incoming => inv.to_group == group,
                Direction::Outgoing => inv.from_group == group,
            })
            .cloned()
            .collect();
        list.sort_by_key(|inv| inv.created_at);
        Ok(list)
    }

    async fn update_tally(&self, id: InvitationId, tally: VoteTally) -> StoreResult<()> {
        self.check_fault("update_tally")?;
        let mut t = self.tables.write().await;
        let inv = t.invitations.get_mut(&id).ok_or(StoreError::NotFound)?;
        if inv.status != InvitationStatus::Pending {
            return Err(StoreError::Conflict);
        }
        inv.tally = Some(tally);
        Ok(())
    }

    async fn resolve_invitation(&self, id: InvitationId, resolution: &Resolution) -> StoreResult<bool> {
        self.check_fault("resolve_invitation")?;
        let mut t = self.tables.write().await;
        let Some(inv) = t.invitations.get_mut(&id) else {
            return Ok(false);
        };
        if inv.status != InvitationStatus::Pending {
            return Ok(false);
        }
        inv.status = resolution.status;
        inv.responded_at = Some(resolution.responded_at);
        if resolution.tally.is_some() {
            inv.tally = resolution.tally;
        }
        Ok(true)
    }

    async fn reopen_invitation(&self, id: InvitationId) -> StoreResult<bool> {
        self.check_fault("reopen_invitation")?;
        let mut t = self.tables.write().await;
        match t.invitations.get_mut(&id) {
            Some(inv) if inv.status == InvitationStatus::Accepted => {
                inv.status = InvitationStatus::Pending;
                inv.responded_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_invitation(&self, id: InvitationId) -> StoreResult<bool> {
        self.check_fault("delete_invitation")?;
        let mut t = self.tables.write().await;
        t.votes.remove(&id);
        Ok(t.invitations.remove(&id).is_some())
    }

    async fn purge_pending_invitations(&self, group: GroupId) -> StoreResult<usize> {
        self.check_fault("purge_pending_invitations")?;
        let mut t = self.tables.write().await;
        Ok(t.delete_invitations_where(|inv| inv.involves(group)))
    }

    async fn purge_pending_between(&self, a: GroupId, b: GroupId) -> StoreResult<usize> {
        self.check_fault("purge_pending_between")?;
        let mut t = self.tables.write().await;
        Ok(t.delete_invitations_where(|inv| inv.involves(a) && inv.involves(b)))
    }

    async fn insert_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.check_fault("insert_vote")?;
        let mut t = self.tables.write().await;
        let status = t
            .invitations
            .get(&vote.invitation_id)
            .map(|inv| inv.status)
            .ok_or(StoreError::NotFound)?;
        if status != InvitationStatus::Pending {
            return Err(StoreError::Conflict);
        }
        let votes = t.votes.entry(vote.invitation_id).or_default();
        if votes.iter().any(|v| v.voter_id == vote.voter_id) {
            return Err(StoreError::AlreadyExists);
        }
        votes.push(vote.clone());
        Ok(())
    }

    async fn list_votes(&self, invitation: InvitationId) -> StoreResult<Vec<Vote>> {
        self.check_fault("list_votes")?;
        Ok(self.tables.read().await.votes.get(&invitation).cloned().unwrap_or_default())
    }

    async fn delete_votes(&self, invitation: InvitationId) -> StoreResult<usize> {
        self.check_fault("delete_votes")?;
        Ok(self.tables.write().await.votes.remove(&invitation).map_or(0, |v| v.len()))
    }

    async fn create_match_if_free(&self, m: &Match) -> StoreResult<()> {
        self.check_fault("create_match_if_free")?;
        let mut t = self.tables.write().await;
        if t.live_match_for(m.group_a).is_some() || t.live_match_for(m.group_b).is_some() {
            return Err(StoreError::Conflict);
        }
        if !t.groups.contains_key(&m.group_a) || !t.groups.contains_key(&m.group_b) {
            return Err(StoreError::NotFound);
        }
        for id in [m.group_a, m.group_b] {
            t.group_mut(id)?.has_active_match = true;
        }
        t.matches.insert(m.id, m.clone());
        Ok(())
    }

    async fn get_match(&self, id: MatchId) -> StoreResult<Option<Match>> {
        self.check_fault("get_match")?;
        Ok(self.tables.read().await.matches.get(&id).cloned())
    }

    async fn find_match_for_group(&self, group: GroupId) -> StoreResult<Option<Match>> {
        self.check_fault("find_match_for_group")?;
        Ok(self.tables.read().await.live_match_for(group).cloned())
    }

    async fn set_venue(&self, id: MatchId, venue: &VenueSuggestion) -> StoreResult<()> {
        self.check_fault("set_venue")?;
        let mut t = self.tables.write().await;
        let m = t.matches.get_mut(&id).ok_or(StoreError::NotFound)?;
        m.venue = Some(venue.clone());
        Ok(())
    }

    async fn mark_venue_attempt(&self, id: MatchId, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_fault("mark_venue_attempt")?;
        let mut t = self.tables.write().await;
        if !t.matches.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        t.venue_attempts.insert(id, at);
        Ok(())
    }

    async fn matches_missing_venue(&self, limit: usize) -> StoreResult<Vec<Match>> {
        self.check_fault("matches_missing_venue")?;
        let t = self.tables.read().await;
        let mut list: Vec<Match> = t.matches.values().filter(|m| m.venue.is_none()).cloned().collect();
        list.sort_by_key(|m| (t.venue_attempts.get(&m.id).copied(), m.created_at));
        list.truncate(limit);
        Ok(list)
    }

    async fn release_match(&self, id: MatchId) -> StoreResult<Option<Match>> {
        self.check_fault("release_match")?;
        let mut t = self.tables.write().await;
        let Some(m) = t.matches.remove(&id) else {
            return Ok(None);
        };
        t.venue_attempts.remove(&id);
        for group in [m.group_a, m.group_b] {
            if let Some(g) = t.groups.get_mut(&group) {
                g.has_active_match = false;
            }
        }
        Ok(Some(m))
    }

    async fn insert_message(&self, message: &ChatMessage) -> StoreResult<()> {
        self.check_fault("insert_message")?;
        let mut t = self.tables.write().await;
        if !t.matches.contains_key(&message.match_id) {
            return Err(StoreError::NotFound);
        }
        t.messages.entry(message.match_id).or_default().push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, match_id: MatchId, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        self.check_fault("list_messages")?;
        let t = self.tables.read().await;
        Ok(t
            .messages
            .get(&match_id)
            .map(|msgs| msgs.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_messages(&self, match_id: MatchId) -> StoreResult<usize> {
        self.check_fault("delete_messages")?;
        Ok(self.tables.write().await.messages.remove(&match_id).map_or(0, |m| m.len()))
    }
}

#[async_trait]
impl Membership for MemoryStore {
    async fn member_count(&self, group: GroupId) -> StoreResult<u32> {
        self.check_fault("member_count")?;
        Ok(self.tables.read().await.members.get(&group).map_or(0, |m| m.len() as u32))
    }

    async fn members(&self, group: GroupId) -> StoreResult<Vec<Member>> {
        self.check_fault("members")?;
        Ok(self.tables.read().await.members.get(&group).cloned().unwrap_or_default())
    }

    async fn member(&self, group: GroupId, user: UserId) -> StoreResult<Option<Member>> {
        self.check_fault("member")?;
        let t = self.tables.read().await;
        Ok(t.members.get(&group).and_then(|m| m.iter().find(|m| m.user_id == user).cloned()))
    }

    async fn add_member(&self, member: &Member) -> StoreResult<()> {
        self.check_fault("add_member")?;
        let mut t = self.tables.write().await;
        if !t.groups.contains_key(&member.group_id) {
            return Err(StoreError::NotFound);
        }
        let roster = t.members.entry(member.group_id).or_default();
        if roster.iter().any(|m| m.user_id == member.user_id) {
            return Err(StoreError::AlreadyExists);
        }
        roster.push(member.clone());
        let count = roster.len() as u32;
        t.group_mut(member.group_id)?.member_count = count;
        Ok(())
    }

    async fn remove_member(&self, group: GroupId, user: UserId) -> StoreResult<u32> {
        self.check_fault("remove_member")?;
        let mut t = self.tables.write().await;
        let roster = t.members.get_mut(&group).ok_or(StoreError::NotFound)?;
        let before = roster.len();
        roster.retain(|m| m.user_id != user);
        if roster.len() == before {
            return Err(StoreError::NotFound);
        }
        let count = roster.len() as u32;
        if let Some(g) = t.groups.get_mut(&group) {
            g.member_count = count;
        }
        Ok(count)
    }
}
