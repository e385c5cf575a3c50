// src/models/material.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'learning_materials' table in the database.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct LearningMaterial {
    pub id: i64,
    pub title: String,

    /// Course or topic the material belongs to.
    pub subject: String,

    /// Sanitized HTML.
    pub description: String,

    /// Link to the document, video or slides.
    pub resource_url: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new material.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(max = 20000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 500), custom(function = validate_url_string))]
    pub resource_url: String,
}

/// Query parameters for listing materials.
#[derive(Debug, Deserialize)]
pub struct MaterialListParams {
    pub subject: Option<String>,
    pub q: Option<String>,
}

/// Validates that a string is an absolute http(s) URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_url")),
    }
}
