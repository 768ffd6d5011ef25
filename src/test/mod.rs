//! In-memory repositories and the HTTP harness shared by the tests, plus the
//! Postgres-backed repository tests.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::api::error;
use crate::modules::friend::model::PendingFriendRequestResponse;
use crate::modules::friend::repository::{FriendRepo, FriendRepository, FriendRequestRepository};
use crate::modules::friend::schema::{ordered_pair, FriendEntity, FriendRequestEntity};
use crate::modules::friend::service::{FriendService, SendRateLimit};
use crate::modules::user::model::{InsertUser, UserResponse};
use crate::modules::user::repository::{SessionRepository, UserRepository};
use crate::modules::user::schema::UserEntity;
use crate::modules::user::service::{TokenConfig, UserService};
use crate::utils::Claims;

#[derive(Default)]
pub struct MockUserRepository {
    users: Mutex<Vec<UserEntity>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &Uuid) -> Option<UserEntity> {
        self.users.lock().unwrap().iter().find(|u| u.id == *id).cloned()
    }

    pub fn deactivate(&self, username: &str) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.iter_mut().find(|u| u.username == username) {
            user.is_active = false;
        }
    }

    fn filtered(&self, username_filter: Option<&str>, exclude_id: &Uuid) -> Vec<UserEntity> {
        let needle = username_filter.map(str::to_lowercase);
        let mut users: Vec<UserEntity> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.id != *exclude_id)
            .filter(|u| {
                needle.as_ref().map_or(true, |n| u.username.to_lowercase().contains(n.as_str()))
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

#[async_trait::async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, error::SystemError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_email_or_username(
        &self,
        identifier: &str,
    ) -> Result<Option<UserEntity>, error::SystemError> {
        let users = self.users.lock().unwrap();
        let by_email = users.iter().find(|u| u.email == identifier);
        Ok(by_email.or_else(|| users.iter().find(|u| u.username == identifier)).cloned())
    }

    async fn create(&self, user: &InsertUser) -> Result<UserEntity, error::SystemError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(error::SystemError::conflict("users_email_key", "duplicate email"));
        }
        if users.iter().any(|u| u.username == user.username) {
            return Err(error::SystemError::conflict("users_username_key", "duplicate username"));
        }

        let now = Utc::now();
        let entity = UserEntity {
            id: Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)),
            username: user.username.clone(),
            email: user.email.clone(),
            hash_password: user.hash_password.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.push(entity.clone());
        Ok(entity)
    }

    async fn search_users(
        &self,
        username_filter: Option<&str>,
        exclude_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserEntity>, error::SystemError> {
        Ok(self
            .filtered(username_filter, exclude_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_users(
        &self,
        username_filter: Option<&str>,
        exclude_id: &Uuid,
    ) -> Result<i64, error::SystemError> {
        Ok(self.filtered(username_filter, exclude_id).len() as i64)
    }
}

#[derive(Default)]
pub struct MockSessionRepository {
    sessions: Mutex<HashMap<Uuid, Uuid>>,
}

impl MockSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl SessionRepository for MockSessionRepository {
    async fn save_session(
        &self,
        jti: &Uuid,
        user_id: &Uuid,
        _ttl_secs: u64,
    ) -> Result<(), error::SystemError> {
        self.sessions.lock().unwrap().insert(*jti, *user_id);
        Ok(())
    }

    async fn find_session(&self, jti: &Uuid) -> Result<Option<Uuid>, error::SystemError> {
        Ok(self.sessions.lock().unwrap().get(jti).copied())
    }

    async fn delete_session(&self, jti: &Uuid) -> Result<bool, error::SystemError> {
        Ok(self.sessions.lock().unwrap().remove(jti).is_some())
    }
}

pub struct MockFriendRepository {
    users: Arc<MockUserRepository>,
    requests: Mutex<Vec<FriendRequestEntity>>,
    friends: Mutex<Vec<FriendEntity>>,
}

impl MockFriendRepository {
    pub fn new(users: Arc<MockUserRepository>) -> Self {
        Self { users, requests: Mutex::new(Vec::new()), friends: Mutex::new(Vec::new()) }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn friendship_count(&self) -> usize {
        self.friends.lock().unwrap().len()
    }

    /// Moves every request sent by `sender_id` `secs` seconds into the past.
    pub fn backdate_requests(&self, sender_id: Uuid, secs: i64) {
        for request in self.requests.lock().unwrap().iter_mut() {
            if request.from_user_id == sender_id {
                request.created_at -= chrono::Duration::seconds(secs);
            }
        }
    }

    pub fn insert_friendship(&self, user_id_a: Uuid, user_id_b: Uuid) {
        let (user_a, user_b) = ordered_pair(user_id_a, user_id_b);
        self.friends.lock().unwrap().push(FriendEntity { user_a, user_b, created_at: Utc::now() });
    }

    fn summary(&self, id: &Uuid) -> Option<UserResponse> {
        self.users.get(id).map(UserResponse::from)
    }
}

#[async_trait::async_trait]
impl FriendRepository for MockFriendRepository {
    async fn find_friendship(
        &self,
        user_id_a: &Uuid,
        user_id_b: &Uuid,
    ) -> Result<Option<FriendEntity>, error::SystemError> {
        let (user_a, user_b) = ordered_pair(*user_id_a, *user_id_b);
        let friends = self.friends.lock().unwrap();
        Ok(friends.iter().find(|f| f.user_a == user_a && f.user_b == user_b).cloned())
    }

    async fn find_friends(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<UserResponse>, error::SystemError> {
        let others: Vec<Uuid> = self
            .friends
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_a == *user_id || f.user_b == *user_id)
            .map(|f| if f.user_a == *user_id { f.user_b } else { f.user_a })
            .collect();
        Ok(others.iter().filter_map(|id| self.summary(id)).collect())
    }
}

#[async_trait::async_trait]
impl FriendRequestRepository for MockFriendRepository {
    async fn find_friend_request_between(
        &self,
        user_id_a: &Uuid,
        user_id_b: &Uuid,
    ) -> Result<Option<FriendRequestEntity>, error::SystemError> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .iter()
            .find(|r| {
                (r.from_user_id == *user_id_a && r.to_user_id == *user_id_b)
                    || (r.from_user_id == *user_id_b && r.to_user_id == *user_id_a)
            })
            .cloned())
    }

    async fn find_pending_request(
        &self,
        sender_id: &Uuid,
        receiver_id: &Uuid,
    ) -> Result<Option<FriendRequestEntity>, error::SystemError> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .iter()
            .find(|r| r.from_user_id == *sender_id && r.to_user_id == *receiver_id && !r.accepted)
            .cloned())
    }

    async fn find_pending_requests_to_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<PendingFriendRequestResponse>, error::SystemError> {
        let pending: Vec<FriendRequestEntity> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.to_user_id == *user_id && !r.accepted)
            .cloned()
            .collect();

        Ok(pending
            .into_iter()
            .filter_map(|r| {
                let from_user = self.summary(&r.from_user_id)?;
                Some(PendingFriendRequestResponse {
                    id: r.id,
                    from_user,
                    accepted: r.accepted,
                    created_at: r.created_at,
                })
            })
            .collect())
    }

    async fn count_requests_since(
        &self,
        sender_id: &Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, error::SystemError> {
        let requests = self.requests.lock().unwrap();
        Ok(requests.iter().filter(|r| r.from_user_id == *sender_id && r.created_at >= since).count()
            as i64)
    }

    async fn create_friend_request(
        &self,
        sender_id: &Uuid,
        receiver_id: &Uuid,
    ) -> Result<FriendRequestEntity, error::SystemError> {
        let mut requests = self.requests.lock().unwrap();
        let pair = ordered_pair(*sender_id, *receiver_id);
        if requests.iter().any(|r| ordered_pair(r.from_user_id, r.to_user_id) == pair) {
            return Err(error::SystemError::conflict(
                "friend_requests_unordered_pair_key",
                "duplicate request",
            ));
        }

        let request = FriendRequestEntity {
            id: Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)),
            from_user_id: *sender_id,
            to_user_id: *receiver_id,
            accepted: false,
            created_at: Utc::now(),
        };
        requests.push(request.clone());
        Ok(request)
    }

    async fn delete_friend_request(&self, request_id: &Uuid) -> Result<bool, error::SystemError> {
        let mut requests = self.requests.lock().unwrap();
        let before = requests.len();
        requests.retain(|r| !(r.id == *request_id && !r.accepted));
        Ok(requests.len() < before)
    }
}

#[async_trait::async_trait]
impl FriendRepo for MockFriendRepository {
    async fn accept_friend_request_atomic(
        &self,
        sender_id: &Uuid,
        receiver_id: &Uuid,
    ) -> Result<(FriendRequestEntity, FriendEntity), error::SystemError> {
        let mut requests = self.requests.lock().unwrap();
        let mut friends = self.friends.lock().unwrap();

        let request = requests
            .iter_mut()
            .find(|r| r.from_user_id == *sender_id && r.to_user_id == *receiver_id && !r.accepted)
            .ok_or_else(|| error::SystemError::not_found("Friend request not found"))?;

        let (user_a, user_b) = ordered_pair(*sender_id, *receiver_id);
        if friends.iter().any(|f| f.user_a == user_a && f.user_b == user_b) {
            // nothing has been written yet, so the request stays pending
            return Err(error::SystemError::conflict("friends_pkey", "duplicate friendship"));
        }

        request.accepted = true;
        let friendship = FriendEntity { user_a, user_b, created_at: Utc::now() };
        friends.push(friendship.clone());

        Ok((request.clone(), friendship))
    }
}

pub const TEST_SECRET: &str = "test-secret";

/// Both services wired to the in-memory repositories.
pub struct TestApp {
    pub users: Arc<MockUserRepository>,
    pub sessions: Arc<MockSessionRepository>,
    pub friends: Arc<MockFriendRepository>,
    pub user_service: UserService,
    pub friend_service: FriendService,
}

impl TestApp {
    pub fn new() -> Self {
        let users = Arc::new(MockUserRepository::new());
        let sessions = Arc::new(MockSessionRepository::new());
        let friends = Arc::new(MockFriendRepository::new(users.clone()));

        let user_service = UserService::with_dependencies(
            users.clone(),
            sessions.clone(),
            TokenConfig { secret: TEST_SECRET.into(), expiration: 3600 },
        );
        let friend_service = FriendService::with_dependencies(
            friends.clone(),
            users.clone(),
            SendRateLimit::default(),
        );

        TestApp { users, sessions, friends, user_service, friend_service }
    }

    /// Creates `name` and returns its id with a live `Authorization` header value.
    pub async fn login(&self, name: &str) -> (Uuid, String) {
        let user = self
            .users
            .create(&InsertUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                hash_password: "hash".into(),
            })
            .await
            .unwrap();

        let jti = Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext));
        let token = Claims::new(&user.id, 3600).with_jti(jti).encode(TEST_SECRET.as_ref()).unwrap();
        self.sessions.save_session(&jti, &user.id, 3600).await.unwrap();

        (user.id, format!("Bearer {token}"))
    }
}

/// Initializes the routes exactly as `main` mounts them, over a [`TestApp`].
macro_rules! init_test_app {
    ($app:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($app.user_service.clone()))
                .app_data(actix_web::web::Data::new($app.friend_service.clone()))
                .configure($crate::modules::user::route::public_api_configure)
                .service(
                    actix_web::web::scope("")
                        .wrap(actix_web::middleware::from_fn(
                            $crate::middlewares::authentication,
                        ))
                        .configure($crate::modules::user::route::configure)
                        .configure($crate::modules::friend::route::configure),
                ),
        )
        .await
    };
}

pub(crate) use init_test_app;

async fn insert_user(pool: &sqlx::PgPool, name: &str) -> Uuid {
    use crate::modules::user::repository_pg::UserRepositoryPg;

    UserRepositoryPg::new(pool.clone())
        .create(&InsertUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            hash_password: "hash".into(),
        })
        .await
        .unwrap()
        .id
}

fn violated_constraint(err: &error::SystemError) -> Option<&str> {
    match err {
        error::SystemError::Conflict(Some(meta)) => meta.constraint.as_deref(),
        _ => None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_accept_friend_request_only_once(pool: sqlx::PgPool) {
    use crate::modules::friend::repository_pg::FriendRepositoryPg;

    let repo = FriendRepositoryPg::new(pool.clone());
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;

    repo.create_friend_request(&alice, &bob).await.unwrap();

    let (request, friendship) = repo.accept_friend_request_atomic(&alice, &bob).await.unwrap();
    assert!(request.accepted);
    assert_eq!((friendship.user_a, friendship.user_b), ordered_pair(alice, bob));

    let err = repo.accept_friend_request_atomic(&alice, &bob).await.unwrap_err();
    assert!(matches!(err, error::SystemError::NotFound(_)));

    // only the addressee side of the pair can accept
    let err = repo.accept_friend_request_atomic(&bob, &alice).await.unwrap_err();
    assert!(matches!(err, error::SystemError::NotFound(_)));

    let friends: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM friends")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(friends, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_accept_rolls_back_when_already_friends(pool: sqlx::PgPool) {
    use crate::modules::friend::repository_pg::FriendRepositoryPg;

    let repo = FriendRepositoryPg::new(pool.clone());
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;

    let (user_a, user_b) = ordered_pair(alice, bob);
    sqlx::query("INSERT INTO friends (user_a, user_b) VALUES ($1, $2)")
        .bind(user_a)
        .bind(user_b)
        .execute(&pool)
        .await
        .unwrap();
    repo.create_friend_request(&alice, &bob).await.unwrap();

    let err = repo.accept_friend_request_atomic(&alice, &bob).await.unwrap_err();
    assert_eq!(violated_constraint(&err), Some("friends_pkey"));

    let pending = repo.find_pending_request(&alice, &bob).await.unwrap();
    assert!(pending.is_some_and(|r| !r.accepted));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_friend_request_pair_is_unique_in_both_directions(pool: sqlx::PgPool) {
    use crate::modules::friend::repository_pg::FriendRepositoryPg;

    let repo = FriendRepositoryPg::new(pool.clone());
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;

    repo.create_friend_request(&alice, &bob).await.unwrap();

    let err = repo.create_friend_request(&bob, &alice).await.unwrap_err();
    assert_eq!(violated_constraint(&err), Some("friend_requests_unordered_pair_key"));
    assert_eq!(error::Error::from(err).to_string(), "Conflict: Friend request already exists");

    let err = repo.create_friend_request(&alice, &bob).await.unwrap_err();
    assert!(matches!(err, error::SystemError::Conflict(_)));

    let err = repo.create_friend_request(&alice, &alice).await.unwrap_err();
    assert!(matches!(err, error::SystemError::BadRequest(_)));

    let since = Utc::now() - chrono::Duration::seconds(60);
    assert_eq!(repo.count_requests_since(&alice, since).await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_friends_rows_are_stored_ordered(pool: sqlx::PgPool) {
    use crate::modules::friend::repository_pg::FriendRepositoryPg;

    let repo = FriendRepositoryPg::new(pool.clone());
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;
    let (low, high) = ordered_pair(alice, bob);

    let err = sqlx::query("INSERT INTO friends (user_a, user_b) VALUES ($1, $2)")
        .bind(high)
        .bind(low)
        .execute(&pool)
        .await
        .unwrap_err();
    assert!(matches!(error::SystemError::from(err), error::SystemError::BadRequest(_)));

    repo.create_friend_request(&bob, &alice).await.unwrap();
    repo.accept_friend_request_atomic(&bob, &alice).await.unwrap();

    let alice_friends = repo.find_friends(&alice).await.unwrap();
    let bob_friends = repo.find_friends(&bob).await.unwrap();
    assert_eq!(alice_friends.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob]);
    assert_eq!(bob_friends.iter().map(|u| u.id).collect::<Vec<_>>(), vec![alice]);
    assert!(repo.find_friendship(&alice, &bob).await.unwrap().is_some());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_friend_request_keeps_accepted_rows(pool: sqlx::PgPool) {
    use crate::modules::friend::repository_pg::FriendRepositoryPg;

    let repo = FriendRepositoryPg::new(pool.clone());
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;
    let carol = insert_user(&pool, "carol").await;

    let pending = repo.create_friend_request(&alice, &carol).await.unwrap();
    let accepted = repo.create_friend_request(&bob, &carol).await.unwrap();
    repo.accept_friend_request_atomic(&bob, &carol).await.unwrap();

    let incoming = repo.find_pending_requests_to_user(&carol).await.unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].from_user.id, alice);

    assert!(!repo.delete_friend_request(&accepted.id).await.unwrap());
    assert!(repo.delete_friend_request(&pending.id).await.unwrap());
    assert!(!repo.delete_friend_request(&pending.id).await.unwrap());
}

