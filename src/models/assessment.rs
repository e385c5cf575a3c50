// src/models/assessment.rs

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::{
    error::AppError,
    models::question::PublicQuestion,
    utils::clock::TimerStatus,
};

/// Kind of a test, stored as lowercase text in `tests.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Mcq,
    Typing,
    Programming,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Mcq => "mcq",
            TestKind::Typing => "typing",
            TestKind::Programming => "programming",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mcq" => Ok(TestKind::Mcq),
            "typing" => Ok(TestKind::Typing),
            "programming" => Ok(TestKind::Programming),
            other => Err(AppError::InternalServerError(format!(
                "Unknown test kind '{}'",
                other
            ))),
        }
    }
}

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Test {
    pub id: i64,
    pub title: String,
    pub description: String,

    /// 'mcq', 'typing' or 'programming'.
    pub kind: String,

    /// Length of the countdown.
    pub duration_minutes: i64,

    /// Text to reproduce in a typing test.
    pub passage: Option<String>,

    /// Task description of a programming test.
    pub problem_statement: Option<String>,

    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Test {
    pub fn kind(&self) -> Result<TestKind, AppError> {
        self.kind.parse()
    }
}

/// Row of the per-user test catalogue, joined with the caller's result.
#[derive(Debug, FromRow)]
pub struct UserTestRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub duration_minutes: i64,
    pub question_count: i64,
    pub score: Option<i64>,
    pub total: Option<i64>,
    pub status: Option<String>,
}

/// Catalogue entry returned by `GET /api/tests/user-tests`.
#[derive(Debug, Serialize)]
pub struct UserTestSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub duration_minutes: i64,
    pub question_count: i64,
    pub attempted: bool,
    pub score: Option<i64>,
    pub total: Option<i64>,
    pub status: Option<String>,
}

impl From<UserTestRow> for UserTestSummary {
    fn from(row: UserTestRow) -> Self {
        Self {
            attempted: row.status.is_some(),
            id: row.id,
            title: row.title,
            description: row.description,
            kind: row.kind,
            duration_minutes: row.duration_minutes,
            question_count: row.question_count,
            score: row.score,
            total: row.total,
            status: row.status,
        }
    }
}

/// Represents the 'test_attempts' table: when a user opened a test.
#[derive(Debug, Clone, FromRow)]
pub struct TestAttempt {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub fullscreen_exits: i64,
}

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub test_id: i64,
    pub eligible: bool,
    /// Machine readable reason when not eligible.
    pub reason: Option<&'static str>,
}

/// Payload of `POST /api/tests/start/{id}`.
#[derive(Debug, Serialize)]
pub struct StartTestResponse {
    pub test_id: i64,
    pub title: String,
    pub kind: TestKind,
    pub duration_minutes: i64,
    pub timer: TimerStatus,
    pub fullscreen_exits: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<PublicQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
}

/// DTO for submitting a test. Which field is required depends on the kind.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTestRequest {
    /// MCQ answers keyed by question id.
    pub answers: Option<HashMap<i64, String>>,

    /// Typing test input.
    #[validate(length(max = 100000))]
    pub typed_text: Option<String>,

    /// Programming solution.
    #[validate(length(min = 1, max = 100000))]
    pub source_code: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub language: Option<String>,
}

/// DTO for creating a new test.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_kind_content))]
pub struct CreateTestRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    pub kind: TestKind,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i64,
    #[validate(length(min = 1, max = 20000))]
    pub passage: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub problem_statement: Option<String>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

/// Typing tests need a passage and programming tests a problem statement.
fn validate_kind_content(req: &CreateTestRequest) -> Result<(), ValidationError> {
    match req.kind {
        TestKind::Typing if req.passage.as_deref().is_none_or(|p| p.trim().is_empty()) => {
            Err(ValidationError::new("typing_test_requires_passage"))
        }
        TestKind::Programming if req.problem_statement.is_none() => {
            Err(ValidationError::new("programming_test_requires_problem_statement"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub is_published: bool,
}
