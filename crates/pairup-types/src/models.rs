use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// -- Identifiers --

/// Strongly-typed identifiers so group, user, invitation and match ids
/// can't be mixed up at call sites.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

id_type!(GroupId);
id_type!(UserId);
id_type!(InvitationId);
id_type!(MatchId);

// -- Enumerations --

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// String-backed enums share the same wire spelling in JSON and in SQLite.
macro_rules! string_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// A group's stated composition. `AllA` and `AllB` are the two mutually
/// exclusive compositions; `Mixed` and `Any` are open to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    AllA,
    AllB,
    Mixed,
    Any,
}

string_enum!(Intent, "intent" {
    AllA => "all-a",
    AllB => "all-b",
    Mixed => "mixed",
    Any => "any",
});

impl Intent {
    pub const ALL: [Intent; 4] = [Intent::AllA, Intent::AllB, Intent::Mixed, Intent::Any];

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Intent::AllA | Intent::AllB)
    }
}

/// How a group decides on incoming invitations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GovernanceMode {
    SingleDecider,
    Consensus,
}

string_enum!(GovernanceMode, "governance mode" {
    SingleDecider => "single-decider",
    Consensus => "consensus",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Creator,
    Admin,
    Member,
}

string_enum!(Role, "role" {
    Creator => "creator",
    Admin => "admin",
    Member => "member",
});

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Creator | Role::Admin)
    }
}

/// A recorded swipe. `RejectedByOther` is the reciprocal record written on
/// the rejected group so the rejecting group never resurfaces for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    Yes,
    No,
    RejectedByOther,
}

string_enum!(DecisionKind, "decision" {
    Yes => "yes",
    No => "no",
    RejectedByOther => "rejected-by-other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

string_enum!(InvitationStatus, "invitation status" {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoteChoice {
    Accept,
    Reject,
}

string_enum!(VoteChoice, "vote" {
    Accept => "accept",
    Reject => "reject",
});

/// Which interest signal produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchOrigin {
    MutualLike,
    Invitation,
}

string_enum!(MatchOrigin, "match origin" {
    MutualLike => "mutual-like",
    Invitation => "invitation",
});

// -- Records --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// Target member count.
    pub size: u32,
    pub member_count: u32,
    pub neighborhood: String,
    pub vibe: String,
    pub intent: Intent,
    pub governance: GovernanceMode,
    /// The member whose answer counts in single-decider mode.
    pub decider_id: UserId,
    pub open_to_match: bool,
    pub has_active_match: bool,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl Group {
    /// Whether this group may currently be shown to, or invited by, others.
    pub fn is_available(&self) -> bool {
        self.open_to_match && !self.has_active_match && self.retired_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub group_id: GroupId,
    pub target_id: GroupId,
    pub kind: DecisionKind,
    pub created_at: DateTime<Utc>,
}

/// Interest of `from_group` recorded on `to_group`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub from_group: GroupId,
    pub to_group: GroupId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub total_votes: u32,
    pub accept_votes: u32,
    pub reject_votes: u32,
    pub vote_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub from_group: GroupId,
    pub to_group: GroupId,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    /// Only present for invitations to consensus-mode groups.
    pub tally: Option<VoteTally>,
}

impl Invitation {
    pub fn new(from_group: GroupId, to_group: GroupId, governance: GovernanceMode) -> Self {
        Self {
            id: InvitationId::new(),
            from_group,
            to_group,
            status: InvitationStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
            tally: match governance {
                GovernanceMode::Consensus => Some(VoteTally::default()),
                GovernanceMode::SingleDecider => None,
            },
        }
    }

    pub fn involves(&self, group: GroupId) -> bool {
        self.from_group == group || self.to_group == group
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub invitation_id: InvitationId,
    pub voter_id: UserId,
    pub voter_name: String,
    pub choice: VoteChoice,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueSuggestion {
    pub suggestion: String,
    pub reasoning: String,
}

/// A live pairing. The group pair is stored in ascending id order so the
/// same two groups always produce the same record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub group_a: GroupId,
    pub group_b: GroupId,
    pub origin: MatchOrigin,
    pub created_at: DateTime<Utc>,
    pub venue: Option<VenueSuggestion>,
}

impl Match {
    pub fn new(first: GroupId, second: GroupId, origin: MatchOrigin) -> Self {
        let (group_a, group_b) = if first <= second { (first, second) } else { (second, first) };
        Self {
            id: MatchId::new(),
            group_a,
            group_b,
            origin,
            created_at: Utc::now(),
            venue: None,
        }
    }

    pub fn involves(&self, group: GroupId) -> bool {
        self.group_a == group || self.group_b == group
    }

    pub fn pairs(&self, first: GroupId, second: GroupId) -> bool {
        self.involves(first) && self.involves(second) && first != second
    }

    pub fn other(&self, group: GroupId) -> Option<GroupId> {
        if self.group_a == group {
            Some(self.group_b)
        } else if self.group_b == group {
            Some(self.group_a)
        } else {
            None
        }
    }
}

/// Chat line stored against a match. Storage only; delivery is elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub match_id: MatchId,
    pub author_id: UserId,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A ranked candidate as returned by the candidate finder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub group: Group,
    pub score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_wire_names() {
        assert_eq!(serde_json::to_string(&Intent::AllA).unwrap(), "\"all-a\"");
        assert_eq!("all-b".parse::<Intent>().unwrap(), Intent::AllB);
        assert!("everyone".parse::<Intent>().is_err());
    }

    #[test]
    fn match_pair_is_order_independent() {
        let x = GroupId::new();
        let y = GroupId::new();
        let m1 = Match::new(x, y, MatchOrigin::MutualLike);
        let m2 = Match::new(y, x, MatchOrigin::MutualLike);
        assert_eq!((m1.group_a, m1.group_b), (m2.group_a, m2.group_b));
        assert!(m1.pairs(y, x));
        assert_eq!(m1.other(x), Some(y));
        assert_eq!(m1.other(GroupId::new()), None);
    }

    #[test]
    fn retired_group_is_unavailable() {
        let mut group = Group {
            id: GroupId::new(),
            name: "Friday crew".into(),
            size: 4,
            member_count: 1,
            neighborhood: "Soho".into(),
            vibe: "chill".into(),
            intent: Intent::Any,
            governance: GovernanceMode::SingleDecider,
            decider_id: UserId::new(),
            open_to_match: true,
            has_active_match: false,
            created_at: Utc::now(),
            retired_at: None,
        };
        assert!(group.is_available());
        group.retired_at = Some(Utc::now());
        assert!(!group.is_available());
    }
}
