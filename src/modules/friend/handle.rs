use actix_web::{delete, get, post, route, web, HttpRequest};

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        friend::{
            model::{
                AcceptFriendRequestResponse, FriendRequestBody, FriendRequestResponse,
                PendingFriendRequestResponse,
            },
            service::FriendService,
        },
        user::model::UserResponse,
    },
    utils::ValidatedJson,
};

#[post("/send/")]
pub async fn send_friend_request(
    friend_service: web::Data<FriendService>,
    body: ValidatedJson<FriendRequestBody>,
    req: HttpRequest,
) -> Result<success::Success<FriendRequestResponse>, error::Error> {
    let sender_id = get_claims(&req)?.sub;
    let request = friend_service.send_friend_request(sender_id, &body.0.email_or_username).await?;

    Ok(success::Success::ok(Some(request)).message("Friend request sent successfully"))
}

#[route("/accept/", method = "PUT", method = "PATCH")]
pub async fn accept_friend_request(
    friend_service: web::Data<FriendService>,
    body: ValidatedJson<FriendRequestBody>,
    req: HttpRequest,
) -> Result<success::Success<AcceptFriendRequestResponse>, error::Error> {
    let receiver_id = get_claims(&req)?.sub;
    let response =
        friend_service.accept_friend_request(receiver_id, &body.0.email_or_username).await?;

    Ok(success::Success::ok(Some(response)).message("Friend request accepted"))
}

#[delete("/reject/")]
pub async fn reject_friend_request(
    friend_service: web::Data<FriendService>,
    body: ValidatedJson<FriendRequestBody>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let receiver_id = get_claims(&req)?.sub;
    friend_service.reject_friend_request(receiver_id, &body.0.email_or_username).await?;

    Ok(success::Success::ok(None).message("Friend request rejected successfully."))
}

#[get("/pending/")]
pub async fn list_pending_requests(
    friend_service: web::Data<FriendService>,
    req: HttpRequest,
) -> Result<success::Success<Vec<PendingFriendRequestResponse>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let requests = friend_service.get_pending_requests(user_id).await?;

    let message = if requests.is_empty() {
        "No pending friend requests"
    } else {
        "Pending friend requests retrieved successfully"
    };
    Ok(success::Success::ok(Some(requests)).message(message))
}

#[get("/friends/")]
pub async fn list_friends(
    friend_service: web::Data<FriendService>,
    req: HttpRequest,
) -> Result<success::Success<Vec<UserResponse>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let friends = friend_service.get_friends(user_id).await?;

    let message = if friends.is_empty() {
        "You have no friends yet."
    } else {
        "Friends retrieved successfully"
    };
    Ok(success::Success::ok(Some(friends)).message(message))
}
