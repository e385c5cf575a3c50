// src/handlers/materials.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::material::{LearningMaterial, MaterialListParams},
};

/// Lists learning materials, optionally filtered by subject and title keyword.
pub async fn list_materials(
    State(pool): State<SqlitePool>,
    Query(params): Query<MaterialListParams>,
) -> Result<impl IntoResponse, AppError> {
    let search_pattern = params.q.map(|k| format!("%{}%", escape_like(&k)));

    let materials: Vec<LearningMaterial> = sqlx::query_as(
        r#"
        SELECT id, title, subject, description, resource_url, created_at
        FROM learning_materials
        WHERE (?1 IS NULL OR subject = ?1)
          AND (?2 IS NULL OR title LIKE ?2 ESCAPE '\')
        ORDER BY subject, title
        "#,
    )
    .bind(params.subject)
    .bind(search_pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(materials))
}

/// Escapes LIKE wildcards so the keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Retrieves a single material by ID.
pub async fn get_material(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let material: LearningMaterial = sqlx::query_as(
        r#"
        SELECT id, title, subject, description, resource_url, created_at
        FROM learning_materials
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Material not found".to_string()))?;

    Ok(Json(material))
}
