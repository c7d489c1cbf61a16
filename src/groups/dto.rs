use serde::Deserialize;

/// Request body for `POST /groups`. The type is parsed after the
/// admission checks, so it stays a plain string here.
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub admin_username: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaveGroupRequest {
    pub admin_username: String,
    pub remaining_time: i64, // milliseconds left for the admin
}
