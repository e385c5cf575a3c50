// src/handlers/assessment.rs

//! Test catalogue, the timed attempt and submission scoring.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    config::{Config, LEADERBOARD_LIMIT, PROGRAMMING_MAX_GRADE},
    error::{AppError, is_unique_violation},
    models::{
        assessment::{
            EligibilityResponse, StartTestResponse, SubmitTestRequest, Test, TestAttempt,
            TestKind, UserTestRow, UserTestSummary,
        },
        question::{PublicQuestion, Question},
        result::{LeaderboardEntry, STATUS_GRADED, STATUS_PENDING, SubmitResponse},
    },
    utils::{
        clock::AttemptClock,
        jwt::Claims,
        scoring::{passed, percentage, score_mcq, score_typing},
    },
};

/// Helper struct for fetching answer keys from the database.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    answer: String,
}

/// Loads a published test or fails with 404.
async fn fetch_published_test(pool: &SqlitePool, test_id: i64) -> Result<Test, AppError> {
    sqlx::query_as(
        r#"
        SELECT id, title, description, kind, duration_minutes, passage,
               problem_statement, is_published, created_at
        FROM tests
        WHERE id = ? AND is_published = TRUE
        "#,
    )
    .bind(test_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))
}

async fn fetch_attempt(
    pool: &SqlitePool,
    user_id: i64,
    test_id: i64,
) -> Result<Option<TestAttempt>, AppError> {
    let attempt = sqlx::query_as(
        r#"
        SELECT id, user_id, test_id, started_at, fullscreen_exits
        FROM test_attempts
        WHERE user_id = ? AND test_id = ?
        "#,
    )
    .bind(user_id)
    .bind(test_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

async fn has_result(pool: &SqlitePool, user_id: i64, test_id: i64) -> Result<bool, AppError> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_results WHERE user_id = ? AND test_id = ?)",
    )
    .bind(user_id)
    .bind(test_id)
    .fetch_one(pool)
    .await?;

    Ok(exists != 0)
}

async fn fetch_questions(pool: &SqlitePool, test_id: i64) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as(
        r#"
        SELECT id, test_id, position, content, options, answer
        FROM questions
        WHERE test_id = ?
        ORDER BY position
        "#,
    )
    .bind(test_id)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

fn already_submitted() -> AppError {
    AppError::Conflict("Test already submitted".to_string())
}

/// Lists published tests together with the caller's attempt status.
pub async fn list_user_tests(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let rows: Vec<UserTestRow> = sqlx::query_as(
        r#"
        SELECT
            t.id, t.title, t.description, t.kind, t.duration_minutes,
            (SELECT COUNT(*) FROM questions q WHERE q.test_id = t.id) AS question_count,
            r.score, r.total, r.status
        FROM tests t
        LEFT JOIN user_results r ON r.test_id = t.id AND r.user_id = ?
        WHERE t.is_published = TRUE
        ORDER BY t.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let tests: Vec<UserTestSummary> = rows.into_iter().map(UserTestSummary::from).collect();

    Ok(Json(tests))
}

/// Tells whether the caller may still take a test.
pub async fn check_eligibility(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    fetch_published_test(&pool, test_id).await?;

    let attempted = has_result(&pool, user_id, test_id).await?;

    Ok(Json(EligibilityResponse {
        test_id,
        eligible: !attempted,
        reason: attempted.then_some("already_attempted"),
    }))
}

/// Starts the caller's attempt, or resumes it with the original start time.
///
/// Returns the content needed to take the test; MCQ answers are never sent.
pub async fn start_test(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let test = fetch_published_test(&pool, test_id).await?;
    let kind = test.kind()?;

    if has_result(&pool, user_id, test_id).await? {
        return Err(already_submitted());
    }

    let questions: Vec<PublicQuestion> = if kind == TestKind::Mcq {
        let questions = fetch_questions(&pool, test_id).await?;
        if questions.is_empty() {
            return Err(AppError::BadRequest("Test has no questions yet".to_string()));
        }
        questions.into_iter().map(PublicQuestion::from).collect()
    } else {
        Vec::new()
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO test_attempts (user_id, test_id, started_at)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id, test_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(test_id)
    .bind(Utc::now())
    .execute(&pool)
    .await?
    .rows_affected();

    let attempt = fetch_attempt(&pool, user_id, test_id)
        .await?
        .ok_or(AppError::InternalServerError(
            "Attempt missing after insert".to_string(),
        ))?;

    if inserted > 0 {
        tracing::info!(user_id, test_id, "attempt started");
    } else {
        tracing::debug!(user_id, test_id, "attempt resumed");
    }

    let clock = AttemptClock::new(attempt.started_at, test.duration_minutes);

    Ok(Json(StartTestResponse {
        test_id,
        title: test.title,
        kind,
        duration_minutes: test.duration_minutes,
        timer: clock.status(Utc::now()),
        fullscreen_exits: attempt.fullscreen_exits,
        questions,
        passage: test.passage.filter(|_| kind == TestKind::Typing),
        problem_statement: test.problem_statement.filter(|_| kind == TestKind::Programming),
    }))
}

/// Reports the countdown of a running attempt.
pub async fn get_timer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let test = fetch_published_test(&pool, test_id).await?;

    let attempt = fetch_attempt(&pool, user_id, test_id)
        .await?
        .ok_or(AppError::NotFound("Test has not been started".to_string()))?;

    let clock = AttemptClock::new(attempt.started_at, test.duration_minutes);
    Ok(Json(clock.status(Utc::now())))
}

/// Records that the test taker left fullscreen during the attempt.
pub async fn record_violation(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if has_result(&pool, user_id, test_id).await? {
        return Err(already_submitted());
    }

    let count: i64 = sqlx::query_scalar(
        r#"
        UPDATE test_attempts
        SET fullscreen_exits = fullscreen_exits + 1
        WHERE user_id = ? AND test_id = ?
        RETURNING fullscreen_exits
        "#,
    )
    .bind(user_id)
    .bind(test_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Test has not been started".to_string()))?;

    tracing::warn!(user_id, test_id, count, "fullscreen exit during attempt");

    Ok(Json(json!({ "test_id": test_id, "fullscreen_exits": count })))
}

/// Outcome of scoring a submission before it is stored.
struct Scored {
    score: i64,
    total: i64,
    status: &'static str,
    details: Option<serde_json::Value>,
    upload: Option<(String, String)>,
}

/// Submits the caller's attempt and stores the single allowed result.
///
/// * MCQ: score is the number of answers matching the key.
/// * Typing: score is the number of correctly typed words.
/// * Programming: stored for manual grading with a pending result.
pub async fn submit_test(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(req): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let user_id = claims.user_id()?;
    let test = fetch_published_test(&pool, test_id).await?;
    let kind = test.kind()?;

    let attempt = fetch_attempt(&pool, user_id, test_id)
        .await?
        .ok_or(AppError::BadRequest("Test has not been started".to_string()))?;

    if has_result(&pool, user_id, test_id).await? {
        return Err(already_submitted());
    }

    let now = Utc::now();
    let clock = AttemptClock::new(attempt.started_at, test.duration_minutes);
    let late = clock.is_late(now, config.submit_grace_seconds);

    let scored = match kind {
        TestKind::Mcq => {
            let answers = req.answers.ok_or(AppError::BadRequest(
                "MCQ submission requires 'answers'".to_string(),
            ))?;

            let key: Vec<AnswerKey> =
                sqlx::query_as("SELECT id, answer FROM questions WHERE test_id = ?")
                    .bind(test_id)
                    .fetch_all(&pool)
                    .await?;
            let key: HashMap<i64, String> = key.into_iter().map(|k| (k.id, k.answer)).collect();

            Scored {
                score: score_mcq(&answers, &key),
                total: key.len() as i64,
                status: STATUS_GRADED,
                details: Some(json!({ "answered": answers.len() })),
                upload: None,
            }
        }
        TestKind::Typing => {
            let typed = req.typed_text.ok_or(AppError::BadRequest(
                "Typing submission requires 'typed_text'".to_string(),
            ))?;
            let passage = test.passage.as_deref().unwrap_or_default();
            let typing = score_typing(passage, &typed, clock.elapsed_seconds(now));

            Scored {
                score: typing.correct_words,
                total: typing.passage_words,
                status: STATUS_GRADED,
                details: Some(
                    serde_json::to_value(&typing)
                        .map_err(|e| AppError::InternalServerError(e.to_string()))?,
                ),
                upload: None,
            }
        }
        TestKind::Programming => {
            let (Some(source_code), Some(language)) = (req.source_code, req.language) else {
                return Err(AppError::BadRequest(
                    "Programming submission requires 'source_code' and 'language'".to_string(),
                ));
            };

            Scored {
                score: 0,
                total: PROGRAMMING_MAX_GRADE,
                status: STATUS_PENDING,
                details: None,
                upload: Some((language, source_code)),
            }
        }
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO user_results (user_id, test_id, score, total, status, late, details, submitted_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(test_id)
    .bind(scored.score)
    .bind(scored.total)
    .bind(scored.status)
    .bind(late)
    .bind(scored.details.clone().map(SqlJson))
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            already_submitted()
        } else {
            tracing::error!("Failed to store result: {:?}", e);
            AppError::from(e)
        }
    })?;

    if let Some((language, source_code)) = scored.upload {
        sqlx::query(
            r#"
            INSERT INTO programming_uploads (user_id, test_id, language, source_code, submitted_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(test_id)
        .bind(language)
        .bind(source_code)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        user_id,
        test_id,
        score = scored.score,
        total = scored.total,
        late,
        "test submitted"
    );

    let graded = scored.status == STATUS_GRADED;
    Ok(Json(SubmitResponse {
        test_id,
        score: scored.score,
        total: scored.total,
        percentage: percentage(scored.score, scored.total),
        passed: graded && passed(scored.score, scored.total),
        late,
        status: scored.status,
        details: scored.details,
    }))
}

/// Retrieves the best graded results of a test.
pub async fn get_leaderboard(
    State(pool): State<SqlitePool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_published_test(&pool, test_id).await?;

    let leaderboard: Vec<LeaderboardEntry> = sqlx::query_as(
        r#"
        SELECT u.username, r.score, r.total, r.submitted_at
        FROM user_results r
        JOIN users u ON r.user_id = u.id
        WHERE r.test_id = ? AND r.status = ?
        ORDER BY r.score DESC, r.submitted_at ASC, r.id ASC
        LIMIT ?
        "#,
    )
    .bind(test_id)
    .bind(STATUS_GRADED)
    .bind(LEADERBOARD_LIMIT)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(leaderboard))
}
