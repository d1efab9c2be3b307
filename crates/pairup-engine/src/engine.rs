use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use pairup_types::models::{
    ChatMessage, DecisionKind, GovernanceMode, Group, GroupId, Intent, Invitation, InvitationId, Match, MatchId,
    Member, Role, UserId, VoteChoice,
};

use crate::authz::{Authorizer, RoleAuthorizer};
use crate::cache::CandidateCache;
use crate::candidates::{CandidateFinder, CandidateSearch};
use crate::config::EngineConfig;
use crate::error::{Conflict, EngineError, EngineResult};
use crate::governance::{Consensus, SingleDecider};
use crate::invitations::{InvitationManager, InvitationOutcome};
use crate::matcher::MatchCreator;
use crate::retry::{self, RetryPolicy};
use crate::store::{Direction, MatchStore, Membership, StoreError};
use crate::swipes::{SwipeOutcome, SwipeRecorder};
use crate::venue::VenueRecommender;

pub const MAX_GROUP_SIZE: u32 = 20;
pub const MAX_NAME_LEN: usize = 80;
pub const MAX_MESSAGE_LEN: usize = 2000;
pub const MAX_MESSAGES: usize = 200;

/// Profile of a group about to be created.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub size: u32,
    pub neighborhood: String,
    pub vibe: String,
    pub intent: Intent,
    pub governance: GovernanceMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub remaining_members: u32,
    /// The group lost its last member.
    pub retired: bool,
}

pub struct Engine {
    store: Arc<dyn MatchStore>,
    members: Arc<dyn Membership>,
    authz: Arc<dyn Authorizer>,
    cache: CandidateCache,
    finder: CandidateFinder,
    swipes: SwipeRecorder,
    invitations: InvitationManager,
    matcher: Arc<MatchCreator>,
    retry: RetryPolicy,
}

impl Engine {
    pub fn new(
        store: Arc<dyn MatchStore>,
        members: Arc<dyn Membership>,
        recommender: Arc<dyn VenueRecommender>,
        config: EngineConfig,
    ) -> Self {
        let authz: Arc<dyn Authorizer> = Arc::new(RoleAuthorizer::new(store.clone(), members.clone()));
        Self::with_authorizer(store, members, authz, recommender, config)
    }

    pub fn with_authorizer(
        store: Arc<dyn MatchStore>,
        members: Arc<dyn Membership>,
        authz: Arc<dyn Authorizer>,
        recommender: Arc<dyn VenueRecommender>,
        config: EngineConfig,
    ) -> Self {
        let cache = CandidateCache::new(config.cache_capacity, config.cache_ttl);
        let matcher = Arc::new(MatchCreator::new(
            store.clone(),
            authz.clone(),
            cache.clone(),
            recommender,
            &config,
        ));
        let finder = CandidateFinder::new(store.clone(), cache.clone(), &config);
        let swipes = SwipeRecorder::new(store.clone(), cache.clone(), matcher.clone());
        let invitations = InvitationManager::new(
            store.clone(),
            cache.clone(),
            matcher.clone(),
            SingleDecider::new(authz.clone()),
            Consensus::new(store.clone(), members.clone()),
            config.retry,
        );

        Self {
            store,
            members,
            authz,
            cache,
            finder,
            swipes,
            invitations,
            matcher,
            retry: config.retry,
        }
    }

    pub fn cache(&self) -> &CandidateCache {
        &self.cache
    }

    // -- Group directory --

    /// The creator becomes the first member, with role `creator`, and the
    /// group's decider.
    pub async fn create_group(&self, creator: UserId, display_name: &str, new: NewGroup) -> EngineResult<Group> {
        let name = new.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(EngineError::validation(format!(
                "group name must be 1-{} characters",
                MAX_NAME_LEN
            )));
        }
        if new.size == 0 || new.size > MAX_GROUP_SIZE {
            return Err(EngineError::validation(format!("group size must be 1-{}", MAX_GROUP_SIZE)));
        }

        let now = Utc::now();
        let group = Group {
            id: GroupId::new(),
            name: name.to_string(),
            size: new.size,
            member_count: 1,
            neighborhood: new.neighborhood.trim().to_string(),
            vibe: new.vibe.trim().to_string(),
            intent: new.intent,
            governance: new.governance,
            decider_id: creator,
            open_to_match: true,
            has_active_match: false,
            created_at: now,
            retired_at: None,
        };
        let member = Member {
            group_id: group.id,
            user_id: creator,
            display_name: display_name.to_string(),
            role: Role::Creator,
            joined_at: now,
        };

        self.store.create_group(&group, &member).await?;
        info!(group_id = %group.id, "Group '{}' created by {} ({})", group.name, creator, group.governance);
        Ok(group)
    }

    pub async fn get_group(&self, group_id: GroupId) -> EngineResult<Group> {
        self.store.get_group(group_id).await?.ok_or(EngineError::NotFound("group"))
    }

    pub async fn join_group(&self, group_id: GroupId, user: UserId, display_name: &str) -> EngineResult<Member> {
        let group = self.get_group(group_id).await?;
        if group.retired_at.is_some() {
            return Err(EngineError::validation("group is no longer active"));
        }

        let member = Member {
            group_id,
            user_id: user,
            display_name: display_name.to_string(),
            role: Role::Member,
            joined_at: Utc::now(),
        };
        match self.members.add_member(&member).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => return Err(EngineError::validation("already a member of this group")),
            Err(StoreError::NotFound) => return Err(EngineError::NotFound("group")),
            Err(e) => return Err(e.into()),
        }

        info!("User {} joined group {}", user, group_id);
        Ok(member)
    }

    /// Leaving as the last member retires the group. A departing decider
    /// hands the role to the longest-standing remaining member.
    pub async fn leave_group(&self, group_id: GroupId, user: UserId) -> EngineResult<LeaveOutcome> {
        let group = self.get_group(group_id).await?;

        let remaining = match self.members.remove_member(group_id, user).await {
            Ok(n) => n,
            Err(StoreError::NotFound) => return Err(EngineError::forbidden("not a member of this group")),
            Err(e) => return Err(e.into()),
        };

        if remaining == 0 {
            retry::with_backoff(&self.retry, "retire group", || self.store.retire_group(group_id, Utc::now())).await?;
            retry::best_effort(&self.retry, "purge invitations of retired group", || {
                self.store.purge_pending_invitations(group_id)
            })
            .await;
            self.cache.invalidate(&[group_id]).await;
            info!("Group {} retired after its last member left", group_id);
            return Ok(LeaveOutcome {
                remaining_members: 0,
                retired: true,
            });
        }

        if group.decider_id == user {
            let roster = self.members.members(group_id).await?;
            if let Some(successor) = roster.first() {
                self.store.set_decider(group_id, successor.user_id).await?;
                info!("Group {} decider passed from {} to {}", group_id, user, successor.user_id);
            }
        }
        self.cache.invalidate(&[group_id]).await;

        match self.invitations.reevaluate(group_id).await {
            Ok(0) => {}
            Ok(n) => info!("Member departure resolved {} pending invitation(s) for {}", n, group_id),
            Err(e) => warn!("Re-tally after departure from {} failed: {}", group_id, e),
        }

        Ok(LeaveOutcome {
            remaining_members: remaining,
            retired: false,
        })
    }

    pub async fn set_visibility(&self, group_id: GroupId, user: UserId, open: bool) -> EngineResult<Group> {
        let group = self.get_group(group_id).await?;
        if !self.authz.is_admin(group_id, user).await? {
            return Err(EngineError::forbidden("only a creator or admin can change visibility"));
        }
        if open && group.retired_at.is_some() {
            return Err(EngineError::validation("group is no longer active"));
        }

        self.store.set_open_to_match(group_id, open).await?;
        self.cache.invalidate(&[group_id]).await;
        Ok(Group {
            open_to_match: open,
            ..group
        })
    }

    // -- Matching --

    pub async fn candidates(&self, group_id: GroupId, user: UserId) -> EngineResult<CandidateSearch> {
        self.ensure_member(group_id, user).await?;
        self.finder.find(group_id).await
    }

    pub async fn record_decision(
        &self,
        group_id: GroupId,
        user: UserId,
        target_id: GroupId,
        decision: DecisionKind,
    ) -> EngineResult<SwipeOutcome> {
        self.ensure_member(group_id, user).await?;
        self.swipes.record(group_id, target_id, decision).await
    }

    pub async fn create_invitation(&self, from: GroupId, user: UserId, to: GroupId) -> EngineResult<Invitation> {
        self.ensure_member(from, user).await?;
        self.invitations.create(from, to).await
    }

    pub async fn list_invitations(
        &self,
        group_id: GroupId,
        user: UserId,
        direction: Direction,
    ) -> EngineResult<Vec<Invitation>> {
        self.ensure_member(group_id, user).await?;
        self.invitations.list_pending(group_id, direction).await
    }

    pub async fn respond_invitation(
        &self,
        id: InvitationId,
        user: UserId,
        choice: VoteChoice,
    ) -> EngineResult<InvitationOutcome> {
        self.invitations.respond(id, choice, user).await
    }

    /// The ballot carries the voter's display name from the roster.
    pub async fn cast_vote(&self, id: InvitationId, user: UserId, choice: VoteChoice) -> EngineResult<InvitationOutcome> {
        let invitation = self
            .store
            .get_invitation(id)
            .await?
            .ok_or(EngineError::NotFound("invitation"))?;
        let voter = self
            .members
            .member(invitation.to_group, user)
            .await?
            .ok_or_else(|| EngineError::validation("voter is not a member of the invited group"))?;

        self.invitations.vote(id, user, &voter.display_name, choice).await
    }

    pub async fn current_match(&self, group_id: GroupId, user: UserId) -> EngineResult<Option<Match>> {
        self.ensure_member(group_id, user).await?;
        Ok(self.store.find_match_for_group(group_id).await?)
    }

    pub async fn end_match(&self, match_id: MatchId, user: UserId) -> EngineResult<Match> {
        self.matcher.end(match_id, user).await
    }

    // -- Venue --

    pub async fn retry_venue(&self, match_id: MatchId, user: UserId) -> EngineResult<Match> {
        let m = self.live_match(match_id).await?;
        self.ensure_match_member(&m, user).await?;
        self.matcher.retry_venue(match_id).await
    }

    /// Background sweep entry point.
    pub async fn fill_missing_venues(&self, limit: usize) -> EngineResult<usize> {
        self.matcher.fill_missing_venues(limit).await
    }

    // -- Match chat --

    pub async fn post_message(&self, match_id: MatchId, user: UserId, body: &str) -> EngineResult<ChatMessage> {
        let body = body.trim();
        if body.is_empty() || body.chars().count() > MAX_MESSAGE_LEN {
            return Err(EngineError::validation(format!(
                "message must be 1-{} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let m = self.live_match(match_id).await?;
        let author = self.ensure_match_member(&m, user).await?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            match_id,
            author_id: user,
            author_name: author.display_name,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        match self.store.insert_message(&message).await {
            Ok(()) => Ok(message),
            Err(StoreError::NotFound) => Err(Conflict::MatchNotFound.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest first.
    pub async fn list_messages(&self, match_id: MatchId, user: UserId, limit: usize) -> EngineResult<Vec<ChatMessage>> {
        let m = self.live_match(match_id).await?;
        self.ensure_match_member(&m, user).await?;
        Ok(self.store.list_messages(match_id, limit.clamp(1, MAX_MESSAGES)).await?)
    }

    // -- Helpers --

    async fn live_match(&self, match_id: MatchId) -> EngineResult<Match> {
        Ok(self
            .store
            .get_match(match_id)
            .await?
            .ok_or(Conflict::MatchNotFound)?)
    }

    async fn ensure_member(&self, group_id: GroupId, user: UserId) -> EngineResult<Member> {
        self.members
            .member(group_id, user)
            .await?
            .ok_or_else(|| EngineError::forbidden("not a member of this group"))
    }

    async fn ensure_match_member(&self, m: &Match, user: UserId) -> EngineResult<Member> {
        for group in [m.group_a, m.group_b] {
            if let Some(member) = self.members.member(group, user).await? {
                return Ok(member);
            }
        }
        Err(EngineError::forbidden("not a member of either matched group"))
    }
}
