use crate::modules::friend::handle::*;
use actix_web::web::{scope, ServiceConfig};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(list_friends).service(
        scope("/friend-requests")
            .service(send_friend_request)
            .service(accept_friend_request)
            .service(reject_friend_request)
            .service(list_pending_requests),
    );
}
