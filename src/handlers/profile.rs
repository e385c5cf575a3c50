use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        result::{MyResult, STATUS_GRADED},
        user::{MeResponse, User},
    },
    utils::jwt::Claims,
};

#[derive(sqlx::FromRow)]
struct ResultStats {
    tests_taken: i64,
    average_percentage: Option<f64>,
}

/// Get current user's profile and assessment statistics.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user: User = sqlx::query_as(
        "SELECT id, username, password, role, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let stats: ResultStats = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) AS tests_taken,
            AVG(CASE WHEN status = ? AND total > 0
                     THEN score * 100.0 / total END) AS average_percentage
        FROM user_results
        WHERE user_id = ?
        "#,
    )
    .bind(STATUS_GRADED)
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        created_at: user.created_at,
        tests_taken: stats.tests_taken,
        average_percentage: stats
            .average_percentage
            .map(|p| (p * 100.0).round() / 100.0),
    }))
}

/// List the current user's results, newest first.
pub async fn list_my_results(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let results: Vec<MyResult> = sqlx::query_as(
        r#"
        SELECT
            r.test_id, t.title, t.kind, r.score, r.total, r.status,
            r.late, r.details, r.submitted_at
        FROM user_results r
        JOIN tests t ON r.test_id = t.id
        WHERE r.user_id = ?
        ORDER BY r.submitted_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}
