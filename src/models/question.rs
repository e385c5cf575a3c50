// src/models/question.rs

use serde::Serialize;
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'questions' table: one answer-key row of an MCQ test.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,

    /// Order of the question within its test, starting at 1.
    pub position: i64,

    /// The text content of the question.
    pub content: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// The correct answer, as option text.
    pub answer: String,
}

/// DTO for sending a question to a test taker (excludes the answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub position: i64,
    pub content: String,
    pub options: Json<Vec<String>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            position: q.position,
            content: q.content,
            options: q.options,
        }
    }
}
