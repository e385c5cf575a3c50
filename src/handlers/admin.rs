// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        assessment::{CreateTestRequest, PublishRequest, Test},
        material::CreateMaterialRequest,
        question::Question,
        result::{STATUS_GRADED, TestResultEntry},
        upload::{GradeRequest, ProgrammingUpload},
    },
    utils::{html::clean_html, sheet::parse_answer_key},
};

async fn ensure_test_exists(pool: &SqlitePool, id: i64) -> Result<Test, AppError> {
    sqlx::query_as(
        r#"
        SELECT id, title, description, kind, duration_minutes, passage,
               problem_statement, is_published, created_at
        FROM tests
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))
}

/// Creates a new test.
/// Admin only.
pub async fn create_test(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let test: Test = sqlx::query_as(
        r#"
        INSERT INTO tests
        (title, description, kind, duration_minutes, passage, problem_statement, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, title, description, kind, duration_minutes, passage,
                  problem_statement, is_published, created_at
        "#,
    )
    .bind(&payload.title)
    .bind(clean_html(&payload.description))
    .bind(payload.kind.as_str())
    .bind(payload.duration_minutes)
    .bind(&payload.passage)
    .bind(payload.problem_statement.as_deref().map(clean_html))
    .bind(payload.is_published)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create test: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(test_id = test.id, kind = %payload.kind, "test created");

    Ok((StatusCode::CREATED, Json(test)))
}

/// Shows or hides a test from the user catalogue.
/// Admin only.
pub async fn set_published(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE tests SET is_published = ? WHERE id = ?")
        .bind(payload.is_published)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a test with its questions, attempts and results.
/// Admin only.
pub async fn delete_test(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM tests WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete test: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the answer key of a test with the questions of an uploaded
/// .xlsx workbook (multipart field `file`).
/// Refused with 409 once anyone has started the test.
/// Admin only.
pub async fn upload_questions(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    ensure_test_exists(&pool, id).await?;

    let mut file_data = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            file_data = Some(field.bytes().await?);
        }
    }

    let file_data = file_data
        .filter(|bytes| !bytes.is_empty())
        .ok_or(AppError::BadRequest("Missing 'file' field".to_string()))?;

    let questions = parse_answer_key(&file_data)?;

    let mut tx = pool.begin().await?;

    // Question ids handed out to running or finished attempts must stay valid
    let taken: i64 = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM test_attempts WHERE test_id = ?1)
            OR EXISTS(SELECT 1 FROM user_results WHERE test_id = ?1)
        "#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if taken != 0 {
        return Err(AppError::Conflict(
            "Answer key cannot be replaced after the test has been started".to_string(),
        ));
    }

    sqlx::query("DELETE FROM questions WHERE test_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for (position, question) in questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO questions (test_id, position, content, options, answer)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(position as i64 + 1)
        .bind(&question.content)
        .bind(SqlJson(question.options.clone()))
        .bind(&question.answer)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(test_id = id, count = questions.len(), "answer key uploaded");

    Ok(Json(serde_json::json!({
        "test_id": id,
        "questions": questions.len(),
    })))
}

/// Lists the questions of a test including answers.
/// Admin only.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_test_exists(&pool, id).await?;

    let questions: Vec<Question> = sqlx::query_as(
        r#"
        SELECT id, test_id, position, content, options, answer
        FROM questions
        WHERE test_id = ?
        ORDER BY position
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

/// Lists every result of a test with usernames and fullscreen exits.
/// Admin only.
pub async fn list_test_results(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_test_exists(&pool, id).await?;

    let results: Vec<TestResultEntry> = sqlx::query_as(
        r#"
        SELECT
            r.id, r.user_id, u.username, r.score, r.total, r.status, r.late,
            COALESCE(a.fullscreen_exits, 0) AS fullscreen_exits,
            r.details, r.submitted_at
        FROM user_results r
        JOIN users u ON r.user_id = u.id
        LEFT JOIN test_attempts a ON a.user_id = r.user_id AND a.test_id = r.test_id
        WHERE r.test_id = ?
        ORDER BY r.score DESC, r.id ASC
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}

/// Lists programming uploads of a test.
/// Admin only.
pub async fn list_uploads(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_test_exists(&pool, id).await?;

    let uploads: Vec<ProgrammingUpload> = sqlx::query_as(
        r#"
        SELECT
            p.id, p.user_id, u.username, p.test_id, p.language, p.source_code,
            p.grade, p.feedback, p.submitted_at, p.graded_at
        FROM programming_uploads p
        JOIN users u ON p.user_id = u.id
        WHERE p.test_id = ?
        ORDER BY p.id
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(uploads))
}

/// Grades a programming upload and marks the matching result as graded.
/// Admin only.
pub async fn grade_upload(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let owner: Option<(i64, i64)> = sqlx::query_as(
        r#"
        UPDATE programming_uploads
        SET grade = ?, feedback = ?, graded_at = ?
        WHERE id = ?
        RETURNING user_id, test_id
        "#,
    )
    .bind(payload.grade)
    .bind(&payload.feedback)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let (user_id, test_id) = owner.ok_or(AppError::NotFound("Upload not found".to_string()))?;

    sqlx::query(
        r#"
        UPDATE user_results
        SET score = ?, status = ?
        WHERE user_id = ? AND test_id = ?
        "#,
    )
    .bind(payload.grade)
    .bind(STATUS_GRADED)
    .bind(user_id)
    .bind(test_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(upload_id = id, user_id, test_id, grade = payload.grade, "upload graded");

    Ok(StatusCode::OK)
}

/// Creates a new learning material.
/// Admin only.
pub async fn create_material(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO learning_materials (title, subject, description, resource_url, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.subject)
    .bind(clean_html(&payload.description))
    .bind(&payload.resource_url)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Deletes a learning material by ID.
/// Admin only.
pub async fn delete_material(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM learning_materials WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Material not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
