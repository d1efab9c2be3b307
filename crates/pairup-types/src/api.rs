use serde::{Deserialize, Serialize};

use crate::models::{
    Candidate, ChatMessage, DecisionKind, GovernanceMode, Group, GroupId, Intent, Invitation,
    InvitationStatus, Match, UserId, VoteChoice, VoteTally,
};

// -- JWT Claims --

/// JWT claims minted by the identity service. Only validated here, never issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    pub size: u32,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub vibe: String,
    pub intent: Intent,
    pub governance: GovernanceMode,
    /// Display name of the creating member; defaults to the token username.
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinGroupRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaveGroupResponse {
    pub remaining_members: u32,
    pub retired: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisibilityRequest {
    pub open_to_match: bool,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub group: Group,
}

// -- Candidates & decisions --

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub candidates: Vec<Candidate>,
    /// True when the search hit its time budget and the list may be short.
    pub partial: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    pub target_id: GroupId,
    pub decision: DecisionKind,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub decision: DecisionKind,
    pub mutual: bool,
    #[serde(rename = "match")]
    pub matched: Option<Match>,
}

// -- Invitations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInvitationRequest {
    pub to_group: GroupId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Deserialize)]
pub struct InvitationQuery {
    pub direction: Option<InvitationDirection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondInvitationRequest {
    pub decision: VoteChoice,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub decision: VoteChoice,
}

#[derive(Debug, Serialize)]
pub struct InvitationOutcomeResponse {
    pub invitation: Invitation,
    pub status: InvitationStatus,
    pub tally: Option<VoteTally>,
    #[serde(rename = "match")]
    pub matched: Option<Match>,
}

// -- Matches --

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    #[serde(rename = "match")]
    pub matched: Option<Match>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    /// Newest-first page size; the engine clamps it.
    pub limit: Option<usize>,
}
