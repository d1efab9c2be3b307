use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use pairup_types::api::{Claims, MatchResponse, MessagesQuery, MessagesResponse, SendMessageRequest};
use pairup_types::models::{GroupId, Match, MatchId};

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_PAGE: usize = 50;

pub async fn current_match(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MatchResponse>> {
    let matched = state.engine.current_match(group_id, claims.sub).await?;
    Ok(Json(MatchResponse { matched }))
}

pub async fn end_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Match>> {
    let ended = state.engine.end_match(match_id, claims.sub).await?;
    Ok(Json(ended))
}

pub async fn retry_venue(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MatchResponse>> {
    let m = state.engine.retry_venue(match_id, claims.sub).await?;
    Ok(Json(MatchResponse { matched: Some(m) }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state.engine.post_message(match_id, claims.sub, &req.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Newest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Query(query): Query<MessagesQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MessagesResponse>> {
    let messages = state
        .engine
        .list_messages(match_id, claims.sub, query.limit.unwrap_or(DEFAULT_PAGE))
        .await?;
    Ok(Json(MessagesResponse { messages }))
}
