// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Percentage of the total a result must reach to count as passed.
pub const PASSING_SCORE_PERCENTAGE: f64 = 60.0;

/// Number of rows returned by a test leaderboard.
pub const LEADERBOARD_LIMIT: i64 = 10;

/// Upper bound for an uploaded answer-key workbook.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Points a programming upload is graded out of.
pub const PROGRAMMING_MAX_GRADE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    /// Seconds accepted past the deadline before a submission is flagged late.
    pub submit_grace_seconds: i64,
    /// Milliseconds for the auth rate limiter to regain one request.
    pub rate_limit_replenish_ms: u64,
    pub rate_limit_burst: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = parse_or("JWT_EXPIRATION", 86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| split_origins(&v))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://127.0.0.1:5173".to_string(),
                ]
            });

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            bind_addr,
            cors_origins,
            submit_grace_seconds: parse_or("SUBMIT_GRACE_SECONDS", 30),
            rate_limit_replenish_ms: parse_or("RATE_LIMIT_REPLENISH_MS", 500),
            rate_limit_burst: parse_or("RATE_LIMIT_BURST", 10),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
