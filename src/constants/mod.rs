pub const SEARCH_PAGE_SIZE: i64 = 10;

pub struct Env {
    pub jwt_secret: String,
    pub token_expiration: u64,
    pub database_url: String,
    pub redis_url: String,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub friend_request_limit: i64,
    pub friend_request_window: i64,
}

impl Env {
    fn new() -> Self {
        let jwt_secret = std::env::var("SECRET_KEY")
            .expect("SECRET_KEY must be set in .env file or environment variable");

        let token_expiration = std::env::var("TOKEN_EXPIRATION")
            .unwrap_or_else(|_| "86400".to_string())
            .parse::<u64>()
            .expect("TOKEN_EXPIRATION must be a valid u64 integer");

        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variable");
        let redis_url = std::env::var("REDIS_URL")
            .expect("REDIS_URL must be set in .env file or environment variable");

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16 integer");

        let friend_request_limit = std::env::var("FRIEND_REQUEST_LIMIT")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<i64>()
            .expect("FRIEND_REQUEST_LIMIT must be a valid integer");
        let friend_request_window = std::env::var("FRIEND_REQUEST_WINDOW")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<i64>()
            .expect("FRIEND_REQUEST_WINDOW must be a valid integer (seconds)");

        Env {
            jwt_secret,
            token_expiration,
            database_url,
            redis_url,
            frontend_url,
            ip,
            port,
            friend_request_limit,
            friend_request_window,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
