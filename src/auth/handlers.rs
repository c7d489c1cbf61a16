use axum::{
    extract::{FromRef, State},
    routing::post,
    Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
    },
    error::AppResult,
    response::{ApiResponse, AppJson},
    state::AppState,
    users::services::Registration,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let user = state
        .users
        .register(Registration {
            name: payload.name,
            username: payload.username,
            email: payload.email,
            password: payload.password,
            type_id: payload.type_id,
        })
        .await?;

    let access_token = JwtKeys::from_ref(&state).sign(&user.name, &user.email)?;
    info!(user_id = %user.id, "registration issued token");
    Ok(ApiResponse::ok(
        AuthResponse { user, access_token },
        "Success register a new user.",
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let user = state
        .users
        .authenticate(&payload.email, &payload.password)
        .await?;

    let access_token = JwtKeys::from_ref(&state).sign(&user.name, &user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok(ApiResponse::ok(
        AuthResponse { user, access_token },
        "Success login.",
    ))
}
