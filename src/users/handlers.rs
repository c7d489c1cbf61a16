use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{dto::UpdateUserRequest, repo_types::{User, UserUpdate}};
use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    response::{ApiResponse, AppJson, AppPath},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<User>>> {
    let users = state.users.list_all().await?;
    Ok(ApiResponse::ok(users, "Success get all users."))
}

#[instrument(skip(state, _caller, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> AppResult<ApiResponse<User>> {
    let user = state
        .users
        .update(
            id,
            UserUpdate {
                name: payload.name,
                remaining_time: payload.remaining_time,
                reached_time_limit: payload.reached_time_limit,
                type_id: payload.type_id,
            },
        )
        .await?;
    Ok(ApiResponse::ok(user, "Success update user."))
}

#[instrument(skip(state, _caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    state.users.delete(id).await?;
    Ok(ApiResponse::message("Success delete user."))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::{
        app::build_app, auth::dto::AuthResponse, response::ApiResponse, state::AppState,
        users::repo_types::User,
    };

    async fn body<T: serde::de::DeserializeOwned>(res: axum::response::Response) -> ApiResponse<T> {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, username: &str) -> AuthResponse {
        let req = Request::post("/api/v1/register")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "name": username,
                    "username": username,
                    "email": format!("{username}@mycap.com"),
                    "password": "s3cr3tp45sw0rd"
                })
                .to_string(),
            ))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        body::<AuthResponse>(res).await.data.unwrap()
    }

    #[tokio::test]
    async fn update_requires_bearer_token() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "alice").await;

        let req = Request::put(format!("/api/v1/users/{}", alice.user.id))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"name": "A", "remaining_time": 1, "reached_time_limit": false}).to_string(),
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_requires_bearer_token() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "alice").await;

        let req = Request::delete(format!("/api/v1/users/{}", alice.user.id))
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let envelope = body::<()>(res).await;
        assert!(!envelope.success);
        assert_eq!(envelope.status, 401);

        let res = app
            .oneshot(Request::get("/api/v1/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body::<Vec<User>>(res).await.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_user_id_is_not_found_in_envelope() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "alice").await;

        let req = Request::delete("/api/v1/users/42")
            .header("authorization", format!("Bearer {}", alice.access_token))
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = body::<()>(res).await;
        assert!(!body.success);
        assert_eq!(body.status, 404);
        assert!(!body.message.contains("UUID"));
    }

    #[tokio::test]
    async fn update_then_list_and_delete() {
        let app = build_app(AppState::fake());
        let alice = register(&app, "alice").await;
        let bearer = format!("Bearer {}", alice.access_token);

        let req = Request::put(format!("/api/v1/users/{}", alice.user.id))
            .header("content-type", "application/json")
            .header("authorization", &bearer)
            .body(Body::from(
                json!({"name": "Alice", "remaining_time": 1800, "reached_time_limit": true})
                    .to_string(),
            ))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let updated: User = body::<User>(res).await.data.unwrap();
        assert_eq!(updated.remaining_time, 1800);
        assert!(updated.reached_time_limit);

        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = body::<Vec<serde_json::Value>>(res).await.data.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].get("password_hash").is_none());
        assert_eq!(listed[0]["type"]["name"], "Free");

        let req = Request::delete(format!("/api/v1/users/{}", alice.user.id))
            .header("authorization", &bearer)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let req = Request::delete(format!("/api/v1/users/{}", alice.user.id))
            .header("authorization", &bearer)
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
