use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use pairup_engine::NewGroup;
use pairup_types::api::{
    Claims, CreateGroupRequest, GroupResponse, JoinGroupRequest, LeaveGroupResponse, VisibilityRequest,
};
use pairup_types::models::GroupId;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let display_name = req.display_name.unwrap_or_else(|| claims.username.clone());
    let group = state
        .engine
        .create_group(
            claims.sub,
            &display_name,
            NewGroup {
                name: req.name,
                size: req.size,
                neighborhood: req.neighborhood,
                vibe: req.vibe,
                intent: req.intent,
                governance: req.governance,
            },
        )
        .await?;

    info!("{} created group {}", claims.username, group.id);
    Ok((StatusCode::CREATED, Json(GroupResponse { group })))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
) -> ApiResult<Json<GroupResponse>> {
    let group = state.engine.get_group(group_id).await?;
    Ok(Json(GroupResponse { group }))
}

pub async fn join_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let display_name = req.display_name.unwrap_or_else(|| claims.username.clone());
    let member = state.engine.join_group(group_id, claims.sub, &display_name).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<LeaveGroupResponse>> {
    let outcome = state.engine.leave_group(group_id, claims.sub).await?;
    Ok(Json(LeaveGroupResponse {
        remaining_members: outcome.remaining_members,
        retired: outcome.retired,
    }))
}

pub async fn set_visibility(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<VisibilityRequest>,
) -> ApiResult<Json<GroupResponse>> {
    let group = state
        .engine
        .set_visibility(group_id, claims.sub, req.open_to_match)
        .await?;
    Ok(Json(GroupResponse { group }))
}
