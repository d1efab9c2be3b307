#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pairup_engine::memory::MemoryStore;
use pairup_engine::retry::RetryPolicy;
use pairup_engine::venue::{NoopRecommender, VenueRecommender};
use pairup_engine::{Engine, EngineConfig, EpochPolicy, MatchStore, NewGroup};
use pairup_types::models::{GovernanceMode, Group, GroupId, Intent, UserId};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<Engine>,
}

pub fn config() -> EngineConfig {
    EngineConfig {
        retry: RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
        ..EngineConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(config(), Arc::new(NoopRecommender))
}

pub fn harness_with_policy(policy: EpochPolicy) -> Harness {
    harness_with(
        EngineConfig {
            epoch_policy: policy,
            ..config()
        },
        Arc::new(NoopRecommender),
    )
}

pub fn harness_with_config(config: EngineConfig) -> Harness {
    harness_with(config, Arc::new(NoopRecommender))
}

pub fn harness_with(config: EngineConfig, recommender: Arc<dyn VenueRecommender>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(Engine::new(store.clone(), store.clone(), recommender, config));
    Harness { store, engine }
}

pub struct Profile {
    pub intent: Intent,
    pub neighborhood: &'static str,
    pub vibe: &'static str,
    pub size: u32,
    pub governance: GovernanceMode,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            intent: Intent::Any,
            neighborhood: "Soho",
            vibe: "chill",
            size: 4,
            governance: GovernanceMode::SingleDecider,
        }
    }
}

/// A group and its creator.
pub struct Fixture {
    pub id: GroupId,
    pub creator: UserId,
}

impl Harness {
    pub async fn group(&self, name: &str, profile: Profile) -> Fixture {
        let creator = UserId::new();
        let group = self
            .engine
            .create_group(
                creator,
                &format!("{} creator", name),
                NewGroup {
                    name: name.to_string(),
                    size: profile.size,
                    neighborhood: profile.neighborhood.to_string(),
                    vibe: profile.vibe.to_string(),
                    intent: profile.intent,
                    governance: profile.governance,
                },
            )
            .await
            .expect("create group");
        Fixture { id: group.id, creator }
    }

    pub async fn default_group(&self, name: &str) -> Fixture {
        self.group(name, Profile::default()).await
    }

    pub async fn consensus_group(&self, name: &str) -> Fixture {
        self.group(
            name,
            Profile {
                governance: GovernanceMode::Consensus,
                ..Profile::default()
            },
        )
        .await
    }

    /// Adds `n` plain members and returns their ids.
    pub async fn add_members(&self, group: GroupId, n: usize) -> Vec<UserId> {
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let user = UserId::new();
            self.engine
                .join_group(group, user, &format!("member {}", i))
                .await
                .expect("join group");
            ids.push(user);
        }
        ids
    }

    pub async fn fetch(&self, group: GroupId) -> Group {
        self.store.get_group(group).await.expect("store").expect("group exists")
    }

    /// Number of live matches referencing `group`, read from the store.
    pub async fn live_matches(&self, group: GroupId) -> usize {
        usize::from(self.store.find_match_for_group(group).await.expect("store").is_some())
    }
}
