use serde::Deserialize;

/// Request body for `PUT /users/{id}`; replaces all three fields.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub remaining_time: i64,
    pub reached_time_limit: bool,
    #[serde(default)]
    pub type_id: Option<i32>,
}
