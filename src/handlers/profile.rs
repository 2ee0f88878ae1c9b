// src/handlers/profile.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::profile::{Profile, UpdateProfileRequest, is_valid_level},
    utils::jwt::Claims,
};

/// Get the current user's profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, password, full_name, role, index_number, level, created_at
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

/// Updates the current user's profile. Fields are optional and
/// applied independently.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;

    if let Some(full_name) = payload.full_name {
        sqlx::query("UPDATE profiles SET full_name = $1 WHERE id = $2")
            .bind(full_name)
            .bind(user_id)
            .execute(&pool)
            .await?;
    }

    if let Some(level) = payload.level {
        if !is_valid_level(level) {
            return Err(AppError::BadRequest(
                "Level must be one of 100, 200, 300 or 400".to_string(),
            ));
        }
        sqlx::query("UPDATE profiles SET level = $1 WHERE id = $2 AND role = 'student'")
            .bind(level)
            .bind(user_id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}
