use actix_web::{get, post, web, HttpRequest};

use crate::api::{error, success};
use crate::middlewares::get_claims;
use crate::modules::user::{model, service::UserService};
use crate::utils::{ValidatedJson, ValidatedQuery};

#[post("/register/")]
pub async fn sign_up(
    user_service: web::Data<UserService>,
    user_data: ValidatedJson<model::SignUpModel>,
) -> Result<success::Success<model::UserResponse>, error::Error> {
    let user = user_service.sign_up(user_data.0).await?;
    Ok(success::Success::created(Some(user)).message("Signup successful"))
}

#[post("/login/")]
pub async fn sign_in(
    user_service: web::Data<UserService>,
    user_data: ValidatedJson<model::SignInModel>,
) -> Result<success::Success<model::SignInResponse>, error::Error> {
    let response = user_service.sign_in(user_data.0).await?;
    Ok(success::Success::ok(Some(response)).message("Signin successful"))
}

#[post("/logout/")]
pub async fn sign_out(
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let claims = get_claims(&req)?;
    user_service.sign_out(&claims).await?;
    Ok(success::Success::ok(None).message("Successfully logged out."))
}

#[get("/search/")]
pub async fn search_users(
    user_service: web::Data<UserService>,
    query: ValidatedQuery<model::SearchQuery>,
    req: HttpRequest,
) -> Result<success::Success<model::Page<model::UserResponse>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let page = user_service.search(user_id, query.0).await?;
    Ok(success::Success::ok(Some(page)).message("Users retrieved successfully"))
}
