// src/models/result.rs

use serde::Serialize;
use sqlx::{FromRow, types::Json};

pub const STATUS_GRADED: &str = "graded";
pub const STATUS_PENDING: &str = "pending";

/// A result of the caller joined with the test title.
#[derive(Debug, Serialize, FromRow)]
pub struct MyResult {
    pub test_id: i64,
    pub title: String,
    pub kind: String,
    pub score: i64,
    pub total: i64,
    pub status: String,
    pub late: bool,
    pub details: Option<Json<serde_json::Value>>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// A result row as seen by an admin, with the username.
#[derive(Debug, Serialize, FromRow)]
pub struct TestResultEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub score: i64,
    pub total: i64,
    pub status: String,
    pub late: bool,
    pub fullscreen_exits: i64,
    pub details: Option<Json<serde_json::Value>>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Aggregated struct for displaying a test leaderboard.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i64,
    pub total: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Response of `POST /api/tests/submit/{id}`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub test_id: i64,
    pub score: i64,
    pub total: i64,
    pub percentage: f64,
    pub passed: bool,
    pub late: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
