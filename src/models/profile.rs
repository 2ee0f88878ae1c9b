// src/models/profile.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Typed role discriminant. The single access-control signal the
/// portal enforces: it is resolved once per protected request (from
/// the JWT claims) and consumed by the role middlewares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }
}

/// Represents the 'profiles' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,

    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub full_name: String,

    /// 'student' or 'staff'.
    pub role: String,

    /// Institution-issued identifier; students only. Usable as a
    /// login alias for email.
    pub index_number: Option<String>,

    /// Academic level (100/200/300/400); students only.
    pub level: Option<i32>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new account (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Full name length must be between 1 and 100 characters."
    ))]
    pub full_name: String,
    pub role: Role,
    pub index_number: Option<String>,
    pub level: Option<i32>,
}

/// DTO for login. The identifier is either an email address or an
/// index number; anything without an '@' is treated as the latter.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100))]
    pub identifier: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for updating the current user's profile. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    pub level: Option<i32>,
}

/// Valid academic levels.
pub const LEVELS: [i32; 4] = [100, 200, 300, 400];

pub fn is_valid_level(level: i32) -> bool {
    LEVELS.contains(&level)
}
