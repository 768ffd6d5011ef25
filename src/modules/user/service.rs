use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::constants::SEARCH_PAGE_SIZE;
use crate::modules::user::model::{
    InsertUser, Page, SearchQuery, SignInModel, SignInResponse, SignUpModel, UserResponse,
};
use crate::modules::user::repository::{SessionRepository, UserRepository};
use crate::utils::{hash_password, verify_password, Claims};

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository + Send + Sync>,
    sessions: Arc<dyn SessionRepository + Send + Sync>,
    tokens: TokenConfig,
}

impl UserService {
    pub fn with_dependencies(
        repo: Arc<dyn UserRepository + Send + Sync>,
        sessions: Arc<dyn SessionRepository + Send + Sync>,
        tokens: TokenConfig,
    ) -> Self {
        info!("UserService initialized with dependencies");
        UserService { repo, sessions, tokens }
    }

    pub async fn sign_up(&self, user: SignUpModel) -> Result<UserResponse, error::SystemError> {
        let hash_password = hash_password(&user.password)?;

        let new_user = InsertUser { username: user.username, email: user.email, hash_password };

        let created = self.repo.create(&new_user).await?;
        info!("User {} registered", created.id);
        Ok(UserResponse::from(created))
    }

    pub async fn sign_in(&self, user: SignInModel) -> Result<SignInResponse, error::SystemError> {
        let user_entity = self
            .repo
            .find_by_email(&user.email)
            .await?
            .ok_or_else(|| error::SystemError::unauthorized("Incorrect Credentials"))?;

        let valid = verify_password(&user_entity.hash_password, &user.password)?;
        if !valid || !user_entity.is_active {
            warn!("Rejected sign in for user {}", user_entity.id);
            return Err(error::SystemError::unauthorized("Incorrect Credentials"));
        }

        let jti = Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext));
        let token = Claims::new(&user_entity.id, self.tokens.expiration)
            .with_jti(jti)
            .encode(self.tokens.secret.as_ref())?;

        self.sessions.save_session(&jti, &user_entity.id, self.tokens.expiration).await?;

        Ok(SignInResponse { token, user_id: user_entity.id, email: user_entity.email })
    }

    pub async fn sign_out(&self, claims: &Claims) -> Result<(), error::SystemError> {
        let Some(jti) = claims.jti else {
            return Err(error::SystemError::bad_request("Token not found."));
        };

        if !self.sessions.delete_session(&jti).await? {
            return Err(error::SystemError::bad_request("Token not found."));
        }

        info!("User {} signed out", claims.sub);
        Ok(())
    }

    /// Resolves a bearer token to the caller's claims. The token must carry a
    /// `jti` whose session is still live and belongs to the token subject.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, error::SystemError> {
        let claims = Claims::decode(token, self.tokens.secret.as_ref())
            .map_err(|_| error::SystemError::unauthorized("Token Invalid or Expired"))?;

        let jti = claims
            .jti
            .ok_or_else(|| error::SystemError::unauthorized("Token Invalid or Expired"))?;

        match self.sessions.find_session(&jti).await? {
            Some(user_id) if user_id == claims.sub => Ok(claims),
            _ => Err(error::SystemError::unauthorized("Token Invalid or Expired")),
        }
    }

    pub async fn search(
        &self,
        caller_id: Uuid,
        query: SearchQuery,
    ) -> Result<Page<UserResponse>, error::SystemError> {
        let page = query.page.unwrap_or(1).max(1);
        let offset = (page - 1)
            .checked_mul(SEARCH_PAGE_SIZE)
            .ok_or_else(|| error::SystemError::bad_request("Invalid page number"))?;
        let keyword = query.search.as_deref().map(str::trim).filter(|q| !q.is_empty());

        if let Some(q) = keyword {
            let by_email = self.repo.find_by_email(q).await?.filter(|u| u.id != caller_id);
            if let Some(user) = by_email {
                let results = if offset == 0 { vec![UserResponse::from(user)] } else { vec![] };
                return Ok(Page { count: 1, page, page_size: SEARCH_PAGE_SIZE, results });
            }
        }

        let count = self.repo.count_users(keyword, &caller_id).await?;
        let users = self.repo.search_users(keyword, &caller_id, SEARCH_PAGE_SIZE, offset).await?;

        Ok(Page {
            count,
            page,
            page_size: SEARCH_PAGE_SIZE,
            results: users.into_iter().map(UserResponse::from).collect(),
        })
    }
}
