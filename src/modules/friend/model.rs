use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::{
    friend::schema::{FriendEntity, FriendRequestEntity},
    user::model::UserResponse,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FriendRequestBody {
    #[validate(length(min = 1, message = "Email or Username is required"))]
    pub email_or_username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendRequestResponse {
    pub id: Uuid,
    pub from_user: UserResponse,
    pub to_user: UserResponse,
    pub accepted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FriendRequestResponse {
    pub fn new(
        request: FriendRequestEntity,
        from_user: UserResponse,
        to_user: UserResponse,
    ) -> Self {
        FriendRequestResponse {
            id: request.id,
            from_user,
            to_user,
            accepted: request.accepted,
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptFriendRequestResponse {
    pub friend_request: FriendRequestResponse,
    pub friendship: FriendEntity,
}

#[derive(sqlx::FromRow)]
pub struct PendingRequestRow {
    pub req_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub accepted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Incoming request as seen by its addressee: sender identity only.
#[derive(Debug, Clone, Serialize)]
pub struct PendingFriendRequestResponse {
    pub id: Uuid,
    pub from_user: UserResponse,
    pub accepted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PendingRequestRow> for PendingFriendRequestResponse {
    fn from(r: PendingRequestRow) -> Self {
        PendingFriendRequestResponse {
            id: r.req_id,
            from_user: UserResponse { id: r.user_id, username: r.username, email: r.email },
            accepted: r.accepted,
            created_at: r.created_at,
        }
    }
}
