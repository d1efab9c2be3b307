pub mod error;
pub mod groups;
pub mod matches;
pub mod matching;
pub mod middleware;
pub mod state;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

pub use error::{ApiError, ApiResult};
pub use state::{AppState, AppStateInner};

/// All routes. Everything except `/health` sits behind bearer auth.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/groups", post(groups::create_group))
        .route("/groups/{group_id}", get(groups::get_group))
        .route("/groups/{group_id}/members", post(groups::join_group))
        .route("/groups/{group_id}/members/me", delete(groups::leave_group))
        .route("/groups/{group_id}/visibility", put(groups::set_visibility))
        .route("/groups/{group_id}/candidates", get(matching::get_candidates))
        .route("/groups/{group_id}/decisions", post(matching::record_decision))
        .route(
            "/groups/{group_id}/invitations",
            get(matching::list_invitations).post(matching::create_invitation),
        )
        .route("/groups/{group_id}/match", get(matches::current_match))
        .route("/invitations/{invitation_id}/respond", post(matching::respond_invitation))
        .route("/invitations/{invitation_id}/votes", post(matching::cast_vote))
        .route("/matches/{match_id}", delete(matches::end_match))
        .route("/matches/{match_id}/venue", post(matches::retry_venue))
        .route(
            "/matches/{match_id}/messages",
            get(matches::get_messages).post(matches::send_message),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
