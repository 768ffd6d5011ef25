use log::{debug, info};
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        friend::{
            model::{
                AcceptFriendRequestResponse, FriendRequestResponse, PendingFriendRequestResponse,
            },
            repository::FriendRepo,
        },
        user::{model::UserResponse, repository::UserRepository, schema::UserEntity},
    },
};

/// At most `max_requests` sends per sender within the trailing `window_secs`.
#[derive(Debug, Clone, Copy)]
pub struct SendRateLimit {
    pub max_requests: i64,
    pub window_secs: i64,
}

impl Default for SendRateLimit {
    fn default() -> Self {
        SendRateLimit { max_requests: 3, window_secs: 60 }
    }
}

#[derive(Clone)]
pub struct FriendService {
    friend_repo: Arc<dyn FriendRepo>,
    user_repo: Arc<dyn UserRepository + Send + Sync>,
    rate_limit: SendRateLimit,
}

impl FriendService {
    pub fn with_dependencies(
        friend_repo: Arc<dyn FriendRepo>,
        user_repo: Arc<dyn UserRepository + Send + Sync>,
        rate_limit: SendRateLimit,
    ) -> Self {
        info!("FriendService initialized with dependencies");
        FriendService { friend_repo, user_repo, rate_limit }
    }

    async fn resolve_user(&self, identifier: &str) -> Result<UserEntity, error::SystemError> {
        self.user_repo
            .find_by_email_or_username(identifier)
            .await?
            .ok_or_else(|| error::SystemError::not_found("User does not exist"))
    }

    pub async fn get_friends(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserResponse>, error::SystemError> {
        let friends = self.friend_repo.find_friends(&user_id).await?;
        Ok(friends)
    }

    pub async fn get_pending_requests(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PendingFriendRequestResponse>, error::SystemError> {
        let requests = self.friend_repo.find_pending_requests_to_user(&user_id).await?;
        Ok(requests)
    }

    pub async fn send_friend_request(
        &self,
        sender_id: Uuid,
        target: &str,
    ) -> Result<FriendRequestResponse, error::SystemError> {
        let receiver = self.resolve_user(target).await?;

        if receiver.id == sender_id {
            return Err(error::SystemError::bad_request("Cannot send friend request to yourself"));
        }

        let (friends, requests) = tokio::try_join!(
            self.friend_repo.find_friendship(&sender_id, &receiver.id),
            self.friend_repo.find_friend_request_between(&sender_id, &receiver.id),
        )?;

        if friends.is_some() {
            return Err(error::SystemError::conflict("friends_pkey", "already friends"));
        }

        if requests.is_some() {
            return Err(error::SystemError::conflict(
                "friend_requests_pair_key",
                "request exists",
            ));
        }

        let since = chrono::Utc::now() - chrono::Duration::seconds(self.rate_limit.window_secs);
        let recent = self.friend_repo.count_requests_since(&sender_id, since).await?;
        if recent >= self.rate_limit.max_requests {
            debug!("User {} hit the friend request limit ({} recent)", sender_id, recent);
            return Err(error::SystemError::too_many_requests(
                "Too many requests. Please wait a while before sending more friend requests.",
            ));
        }

        let sender = self
            .user_repo
            .find_by_id(&sender_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("User not found"))?;

        let request = self.friend_repo.create_friend_request(&sender_id, &receiver.id).await?;
        info!("Friend request {} sent from {} to {}", request.id, sender_id, receiver.id);

        Ok(FriendRequestResponse::new(request, sender.into(), receiver.into()))
    }

    pub async fn accept_friend_request(
        &self,
        user_id: Uuid,
        requester: &str,
    ) -> Result<AcceptFriendRequestResponse, error::SystemError> {
        let from_user = self.resolve_user(requester).await?;

        let to_user = self
            .user_repo
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("User not found"))?;

        let (request, friendship) =
            self.friend_repo.accept_friend_request_atomic(&from_user.id, &user_id).await?;
        info!(
            "Friend request {} accepted, {} and {} are friends",
            request.id, from_user.id, user_id
        );

        Ok(AcceptFriendRequestResponse {
            friend_request: FriendRequestResponse::new(request, from_user.into(), to_user.into()),
            friendship,
        })
    }

    pub async fn reject_friend_request(
        &self,
        user_id: Uuid,
        requester: &str,
    ) -> Result<(), error::SystemError> {
        let from_user = self.resolve_user(requester).await?;

        let request = self
            .friend_repo
            .find_pending_request(&from_user.id, &user_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Friend request not found"))?;

        // unreachable while find_pending_request filters on the addressee
        if request.to_user_id != user_id {
            return Err(error::SystemError::forbidden(
                "You are not authorized to reject this request",
            ));
        }

        if !self.friend_repo.delete_friend_request(&request.id).await? {
            return Err(error::SystemError::not_found("Friend request not found"));
        }

        info!("Friend request {} rejected by {}", request.id, user_id);
        Ok(())
    }
}
