use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{CreateGroupRequest, JoinGroupRequest, LeaveGroupRequest},
    repo_types::Group,
    services::LeaveOutcome,
};
use crate::{
    auth::extractors::CurrentUser,
    error::AppResult,
    response::{ApiResponse, AppJson},
    state::AppState,
};

pub fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/join-groups", post(join_group))
        .route("/leave-groups", post(leave_group))
}

#[instrument(skip(state))]
pub async fn list_groups(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Group>>> {
    let groups = state.groups.list_all().await?;
    Ok(ApiResponse::ok(groups, "Success get all groups."))
}

#[instrument(skip(state, caller, payload))]
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    AppJson(payload): AppJson<CreateGroupRequest>,
) -> AppResult<ApiResponse<Group>> {
    let group = state.groups.create(&caller, &payload.kind).await?;
    Ok(ApiResponse::ok(group, "Success create a new group."))
}

#[instrument(skip(state, caller, payload))]
pub async fn join_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    AppJson(payload): AppJson<JoinGroupRequest>,
) -> AppResult<ApiResponse<Group>> {
    let group = state.groups.join(&caller, &payload.admin_username).await?;
    Ok(ApiResponse::ok(group, "Success joining a group."))
}

#[instrument(skip(state, caller, payload))]
pub async fn leave_group(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    AppJson(payload): AppJson<LeaveGroupRequest>,
) -> AppResult<ApiResponse<Group>> {
    let outcome = state
        .groups
        .leave(&caller, &payload.admin_username, payload.remaining_time)
        .await?;
    Ok(match outcome {
        LeaveOutcome::Left(group) => ApiResponse::ok(group, "Success leaving group."),
        LeaveOutcome::Terminated(group) => {
            ApiResponse::ok(group, "Success leaving group, group has been terminated.")
        }
    })
}
