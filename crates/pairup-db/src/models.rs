//! Database row types. These map directly to SQLite rows and are converted to
//! the shared `pairup-types` models at the edge, keeping the schema free to
//! differ from the wire format.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;

use pairup_types::models::{
    ChatMessage, Decision, Group, Invitation, Match, Member, VenueSuggestion, Vote, VoteTally,
};

/// Fixed-width UTC timestamps so that text ordering equals time ordering.
pub fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp '{}'", s))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

pub const GROUP_COLUMNS: &str = "g.id, g.name, g.size, g.neighborhood, g.vibe, g.intent, g.governance, \
     g.decider_id, g.open_to_match, g.has_active_match, g.created_at, g.retired_at, \
     (SELECT COUNT(*) FROM members m WHERE m.group_id = g.id)";

pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub size: u32,
    pub neighborhood: String,
    pub vibe: String,
    pub intent: String,
    pub governance: String,
    pub decider_id: String,
    pub open_to_match: bool,
    pub has_active_match: bool,
    pub created_at: String,
    pub retired_at: Option<String>,
    pub member_count: u32,
}

impl GroupRow {
    /// Expects the columns of [`GROUP_COLUMNS`], in order.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            size: row.get(2)?,
            neighborhood: row.get(3)?,
            vibe: row.get(4)?,
            intent: row.get(5)?,
            governance: row.get(6)?,
            decider_id: row.get(7)?,
            open_to_match: row.get(8)?,
            has_active_match: row.get(9)?,
            created_at: row.get(10)?,
            retired_at: row.get(11)?,
            member_count: row.get(12)?,
        })
    }

    pub fn into_model(self) -> Result<Group> {
        Ok(Group {
            id: self.id.parse()?,
            name: self.name,
            size: self.size,
            member_count: self.member_count,
            neighborhood: self.neighborhood,
            vibe: self.vibe,
            intent: self.intent.parse()?,
            governance: self.governance.parse()?,
            decider_id: self.decider_id.parse()?,
            open_to_match: self.open_to_match,
            has_active_match: self.has_active_match,
            created_at: parse_ts(&self.created_at)?,
            retired_at: parse_opt_ts(self.retired_at)?,
        })
    }
}

pub const MEMBER_COLUMNS: &str = "group_id, user_id, display_name, role, joined_at";

pub struct MemberRow {
    pub group_id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: String,
    pub joined_at: String,
}

impl MemberRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            group_id: row.get(0)?,
            user_id: row.get(1)?,
            display_name: row.get(2)?,
            role: row.get(3)?,
            joined_at: row.get(4)?,
        })
    }

    pub fn into_model(self) -> Result<Member> {
        Ok(Member {
            group_id: self.group_id.parse()?,
            user_id: self.user_id.parse()?,
            display_name: self.display_name,
            role: self.role.parse()?,
            joined_at: parse_ts(&self.joined_at)?,
        })
    }
}

pub struct DecisionRow {
    pub group_id: String,
    pub target_id: String,
    pub kind: String,
    pub created_at: String,
}

impl DecisionRow {
    pub fn into_model(self) -> Result<Decision> {
        Ok(Decision {
            group_id: self.group_id.parse()?,
            target_id: self.target_id.parse()?,
            kind: self.kind.parse()?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub const INVITATION_COLUMNS: &str = "id, from_group, to_group, status, created_at, responded_at, \
     total_votes, accept_votes, reject_votes, vote_complete";

pub struct InvitationRow {
    pub id: String,
    pub from_group: String,
    pub to_group: String,
    pub status: String,
    pub created_at: String,
    pub responded_at: Option<String>,
    pub total_votes: Option<u32>,
    pub accept_votes: Option<u32>,
    pub reject_votes: Option<u32>,
    pub vote_complete: Option<bool>,
}

impl InvitationRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from_group: row.get(1)?,
            to_group: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            responded_at: row.get(5)?,
            total_votes: row.get(6)?,
            accept_votes: row.get(7)?,
            reject_votes: row.get(8)?,
            vote_complete: row.get(9)?,
        })
    }

    pub fn into_model(self) -> Result<Invitation> {
        // The tally columns are either all set (consensus) or all null.
        let tally = match (self.total_votes, self.accept_votes, self.reject_votes) {
            (Some(total_votes), Some(accept_votes), Some(reject_votes)) => Some(VoteTally {
                total_votes,
                accept_votes,
                reject_votes,
                vote_complete: self.vote_complete.unwrap_or(false),
            }),
            _ => None,
        };

        Ok(Invitation {
            id: self.id.parse()?,
            from_group: self.from_group.parse()?,
            to_group: self.to_group.parse()?,
            status: self.status.parse()?,
            created_at: parse_ts(&self.created_at)?,
            responded_at: parse_opt_ts(self.responded_at)?,
            tally,
        })
    }
}

pub struct VoteRow {
    pub invitation_id: String,
    pub voter_id: String,
    pub voter_name: String,
    pub choice: String,
    pub created_at: String,
}

impl VoteRow {
    pub fn into_model(self) -> Result<Vote> {
        Ok(Vote {
            invitation_id: self.invitation_id.parse()?,
            voter_id: self.voter_id.parse()?,
            voter_name: self.voter_name,
            choice: self.choice.parse()?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub const MATCH_COLUMNS: &str = "id, group_a, group_b, origin, created_at, venue_suggestion, venue_reasoning";

pub struct MatchRow {
    pub id: String,
    pub group_a: String,
    pub group_b: String,
    pub origin: String,
    pub created_at: String,
    pub venue_suggestion: Option<String>,
    pub venue_reasoning: Option<String>,
}

impl MatchRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            group_a: row.get(1)?,
            group_b: row.get(2)?,
            origin: row.get(3)?,
            created_at: row.get(4)?,
            venue_suggestion: row.get(5)?,
            venue_reasoning: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<Match> {
        let venue = self.venue_suggestion.map(|suggestion| VenueSuggestion {
            suggestion,
            reasoning: self.venue_reasoning.unwrap_or_default(),
        });
        Ok(Match {
            id: self.id.parse()?,
            group_a: self.group_a.parse()?,
            group_b: self.group_b.parse()?,
            origin: self.origin.parse()?,
            created_at: parse_ts(&self.created_at)?,
            venue,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub match_id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_model(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: self.id.parse()?,
            match_id: self.match_id.parse()?,
            author_id: self.author_id.parse()?,
            author_name: self.author_name,
            body: self.body,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}
