//! Candidates, swipes and the invitation lifecycle.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use pairup_engine::Direction;
use pairup_engine::invitations::InvitationOutcome;
use pairup_types::api::{
    CandidatesResponse, CastVoteRequest, Claims, CreateInvitationRequest, DecisionRequest, DecisionResponse,
    InvitationDirection, InvitationOutcomeResponse, InvitationQuery, RespondInvitationRequest,
};
use pairup_types::models::{GroupId, Invitation, InvitationId};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_candidates(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<CandidatesResponse>> {
    let search = state.engine.candidates(group_id, claims.sub).await?;
    Ok(Json(CandidatesResponse {
        candidates: search.candidates,
        partial: search.partial,
    }))
}

pub async fn record_decision(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    let outcome = state
        .engine
        .record_decision(group_id, claims.sub, req.target_id, req.decision)
        .await?;
    Ok(Json(DecisionResponse {
        decision: outcome.decision,
        mutual: outcome.mutual,
        matched: outcome.matched,
    }))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<impl IntoResponse> {
    let invitation = state
        .engine
        .create_invitation(group_id, claims.sub, req.to_group)
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

pub async fn list_invitations(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Query(query): Query<InvitationQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Invitation>>> {
    let direction = match query.direction {
        Some(InvitationDirection::Outgoing) => Direction::Outgoing,
        Some(InvitationDirection::Incoming) | None => Direction::Incoming,
    };
    let invitations = state
        .engine
        .list_invitations(group_id, claims.sub, direction)
        .await?;
    Ok(Json(invitations))
}

pub async fn respond_invitation(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RespondInvitationRequest>,
) -> ApiResult<Json<InvitationOutcomeResponse>> {
    let outcome = state
        .engine
        .respond_invitation(invitation_id, claims.sub, req.decision)
        .await?;
    Ok(Json(outcome_response(outcome)))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(invitation_id): Path<InvitationId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CastVoteRequest>,
) -> ApiResult<Json<InvitationOutcomeResponse>> {
    let outcome = state
        .engine
        .cast_vote(invitation_id, claims.sub, req.decision)
        .await?;
    Ok(Json(outcome_response(outcome)))
}

fn outcome_response(outcome: InvitationOutcome) -> InvitationOutcomeResponse {
    InvitationOutcomeResponse {
        status: outcome.invitation.status,
        tally: outcome.invitation.tally,
        invitation: outcome.invitation,
        matched: outcome.matched,
    }
}
