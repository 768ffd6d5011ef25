use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Stored with `user_a < user_b`, one row per unordered pair.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FriendEntity {
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub fn ordered_pair(user_id_a: Uuid, user_id_b: Uuid) -> (Uuid, Uuid) {
    if user_id_a <= user_id_b {
        (user_id_a, user_id_b)
    } else {
        (user_id_b, user_id_a)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FriendRequestEntity {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub accepted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
