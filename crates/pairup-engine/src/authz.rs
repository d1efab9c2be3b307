use std::sync::Arc;

use async_trait::async_trait;

use pairup_types::models::{GroupId, UserId};

use crate::store::{MatchStore, Membership, StoreResult};

/// Boolean gates consulted before privileged actions. Authentication happens
/// upstream; this only answers "may this user do that for this group".
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// The one member whose response counts in single-decider mode.
    async fn is_decider(&self, group: GroupId, user: UserId) -> StoreResult<bool>;
    /// Creator or admin; may end matches and change visibility.
    async fn is_admin(&self, group: GroupId, user: UserId) -> StoreResult<bool>;
}

/// Derives both answers from the member roster and the group's decider.
pub struct RoleAuthorizer {
    store: Arc<dyn MatchStore>,
    members: Arc<dyn Membership>,
}

impl RoleAuthorizer {
    pub fn new(store: Arc<dyn MatchStore>, members: Arc<dyn Membership>) -> Self {
        Self { store, members }
    }
}

#[async_trait]
impl Authorizer for RoleAuthorizer {
    async fn is_decider(&self, group: GroupId, user: UserId) -> StoreResult<bool> {
        let Some(g) = self.store.get_group(group).await? else {
            return Ok(false);
        };
        if g.decider_id != user {
            return Ok(false);
        }
        // A decider who has since left holds no power.
        Ok(self.members.member(group, user).await?.is_some())
    }

    async fn is_admin(&self, group: GroupId, user: UserId) -> StoreResult<bool> {
        Ok(self
            .members
            .member(group, user)
            .await?
            .is_some_and(|m| m.role.is_admin()))
    }
}
