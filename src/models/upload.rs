// src/models/upload.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'programming_uploads' table: a solution awaiting or
/// holding a manual grade.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProgrammingUpload {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub test_id: i64,
    pub language: String,
    pub source_code: String,
    pub grade: Option<i64>,
    pub feedback: Option<String>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub graded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for grading an upload.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeRequest {
    #[validate(range(min = 0, max = 100))]
    pub grade: i64,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}
