use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use pairup_types::models::{Group, Match, VenueSuggestion};

use crate::store::MatchStore;

#[async_trait]
pub trait VenueRecommender: Send + Sync {
    /// False when no recommender is configured; callers skip the request.
    fn enabled(&self) -> bool {
        true
    }

    async fn suggest(&self, a: &Group, b: &Group) -> Result<VenueSuggestion>;
}

/// Used when no recommender endpoint is configured.
pub struct NoopRecommender;

#[async_trait]
impl VenueRecommender for NoopRecommender {
    fn enabled(&self) -> bool {
        false
    }

    async fn suggest(&self, _a: &Group, _b: &Group) -> Result<VenueSuggestion> {
        Err(anyhow!("venue recommender is not configured"))
    }
}

#[derive(Serialize)]
struct GroupProfile<'a> {
    name: &'a str,
    size: u32,
    neighborhood: &'a str,
    vibe: &'a str,
    intent: &'a str,
}

impl<'a> From<&'a Group> for GroupProfile<'a> {
    fn from(g: &'a Group) -> Self {
        Self {
            name: &g.name,
            size: g.size,
            neighborhood: &g.neighborhood,
            vibe: &g.vibe,
            intent: g.intent.as_str(),
        }
    }
}

#[derive(Serialize)]
struct SuggestRequest<'a> {
    group_a: GroupProfile<'a>,
    group_b: GroupProfile<'a>,
}

/// POSTs both profiles as JSON and expects `{ "suggestion", "reasoning" }`.
pub struct HttpVenueRecommender {
    client: reqwest::Client,
    url: String,
}

impl HttpVenueRecommender {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building venue recommender client")?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl VenueRecommender for HttpVenueRecommender {
    async fn suggest(&self, a: &Group, b: &Group) -> Result<VenueSuggestion> {
        let body = SuggestRequest {
            group_a: a.into(),
            group_b: b.into(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("venue recommender request failed")?
            .error_for_status()
            .context("venue recommender returned an error status")?;

        let suggestion: VenueSuggestion = response
            .json()
            .await
            .context("venue recommender returned malformed JSON")?;
        Ok(suggestion)
    }
}

/// Fetch a suggestion for `m` and attach it. Returns `None` when the
/// recommender is disabled or one of the groups no longer exists.
pub async fn suggest_for_match(
    store: &dyn MatchStore,
    recommender: &dyn VenueRecommender,
    m: &Match,
    timeout: Duration,
) -> Result<Option<VenueSuggestion>> {
    if !recommender.enabled() {
        return Ok(None);
    }

    let groups = store.get_groups(&[m.group_a, m.group_b]).await?;
    let (Some(a), Some(b)) = (
        groups.iter().find(|g| g.id == m.group_a),
        groups.iter().find(|g| g.id == m.group_b),
    ) else {
        warn!("Match {} references a missing group, skipping venue suggestion", m.id);
        return Ok(None);
    };

    if let Err(e) = store.mark_venue_attempt(m.id, Utc::now()).await {
        warn!("Could not record venue attempt for match {}: {}", m.id, e);
    }

    let suggestion = tokio::time::timeout(timeout, recommender.suggest(a, b))
        .await
        .map_err(|_| anyhow!("venue recommender timed out after {:?}", timeout))??;

    store.set_venue(m.id, &suggestion).await?;
    info!("Venue suggestion attached to match {}", m.id);
    Ok(Some(suggestion))
}
