use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::{password, tokens};
use crate::errors::AppError;
use crate::models::user::{UserRow, ROLE_ADMIN};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
    pub name: String,
    pub email: Option<String>,
}

/// POST /api/auth/login
/// The client-claimed role is ignored; the server returns the actual one.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let hash = user.password_hash.as_deref().unwrap_or("");
    if !password::verify_password(&req.password, hash) {
        return Err(AppError::Unauthorized);
    }
    if !user.active {
        return Err(AppError::Forbidden);
    }

    let token = tokens::issue_token(&state.db, user.id, state.config.token_ttl_hours)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(LoginResponse {
        token,
        role: user.role,
        name: user.name,
        email: user.email,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub admin_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub role: String,
    pub name: String,
    pub email: String,
    /// True when this registration created the very first admin.
    pub bootstrap: bool,
}

/// POST /api/auth/register
/// Admin bootstrap only: the first admin registers freely, every later one
/// must present the configured admin keyword. Public signup for other roles
/// is disabled; students and coordinators are provisioned by an admin.
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }

    let role = req.role.as_deref().unwrap_or(ROLE_ADMIN).to_lowercase();
    if role != ROLE_ADMIN {
        return Err(AppError::Forbidden);
    }

    let admin_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
        .bind(ROLE_ADMIN)
        .fetch_one(&state.db)
        .await?;
    if admin_count > 0 && req.admin_key.as_deref() != Some(state.config.admin_reg_key.as_str()) {
        return Err(AppError::Forbidden);
    }

    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE lower(email) = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let hash = password::hash_password(&req.password).map_err(AppError::Internal)?;
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (name, email, role, password_hash, active)
        VALUES ($1, $2, $3, $4, TRUE)
        RETURNING id
        "#,
    )
    .bind(&name)
    .bind(&email)
    .bind(ROLE_ADMIN)
    .bind(&hash)
    .fetch_one(&state.db)
    .await?;

    info!("Registered admin {email} (bootstrap: {})", admin_count == 0);

    Ok(Json(RegisterResponse {
        id,
        role: ROLE_ADMIN.to_string(),
        name,
        email,
        bootstrap: admin_count == 0,
    }))
}
