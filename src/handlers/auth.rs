// src/handlers/auth.rs

use std::sync::LazyLock;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use regex::Regex;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::profile::{LoginRequest, Profile, RegisterRequest, Role, is_valid_level},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Institution index number, e.g. UDS/TCH/21/0001.
static INDEX_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,6}/[A-Za-z]{2,6}/\d{2}/\d{1,6}$").expect("index number regex")
});

/// Registers a new account.
///
/// Students must supply an index number and a level; staff have
/// neither. Passwords are hashed with Argon2 before storage.
/// Returns 201 Created with the new profile id.
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let (index_number, level) = match payload.role {
        Role::Student => {
            let index_number = payload
                .index_number
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("Students must provide an index number".to_string())
                })?;
            if !INDEX_NUMBER_RE.is_match(index_number) {
                return Err(AppError::BadRequest(
                    "Index number must look like UDS/TCH/21/0001".to_string(),
                ));
            }
            let level = payload
                .level
                .ok_or_else(|| AppError::BadRequest("Students must provide a level".to_string()))?;
            if !is_valid_level(level) {
                return Err(AppError::BadRequest(
                    "Level must be one of 100, 200, 300 or 400".to_string(),
                ));
            }
            (Some(index_number.to_string()), Some(level))
        }
        Role::Staff => (None, None),
    };

    let hashed_password = hash_password(&payload.password)?;

    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO profiles (email, password, full_name, role, index_number, level)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(payload.email.to_lowercase())
    .bind(hashed_password)
    .bind(&payload.full_name)
    .bind(payload.role.as_str())
    .bind(index_number)
    .bind(level)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("An account with that email or index number already exists".to_string())
        } else {
            tracing::error!("Failed to register profile: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Authenticates a user and returns a JWT token.
///
/// The identifier may be an email or an index number: anything
/// without an '@' is first resolved to an email by a case-insensitive
/// index number lookup. A failed lookup is "no account found", which
/// is deliberately distinct from a bad-credential failure. The role
/// returned here is read fresh from the profile row, never cached.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let email = if payload.identifier.contains('@') {
        payload.identifier.to_lowercase()
    } else {
        sqlx::query_scalar::<_, String>(
            "SELECT email FROM profiles WHERE LOWER(index_number) = LOWER($1)",
        )
        .bind(payload.identifier.trim())
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Index number lookup error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or_else(|| {
            AppError::NotFound("No account found with that index number".to_string())
        })?
    };

    let profile = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, email, password, full_name, role, index_number, level, created_at
        FROM profiles
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    let is_valid = verify_password(&payload.password, &profile.password)?;

    if !is_valid {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let role = Role::parse(&profile.role).ok_or_else(|| {
        AppError::InternalServerError(format!("Profile {} has unknown role", profile.id))
    })?;

    let token = sign_jwt(profile.id, role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": role,
        "full_name": profile.full_name,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_number_format() {
        assert!(INDEX_NUMBER_RE.is_match("UDS/TCH/21/0001"));
        assert!(INDEX_NUMBER_RE.is_match("uds/tch/21/0001"));
        assert!(!INDEX_NUMBER_RE.is_match("UDS-TCH-21-0001"));
        assert!(!INDEX_NUMBER_RE.is_match("someone@example.com"));
        assert!(!INDEX_NUMBER_RE.is_match(""));
    }
}
