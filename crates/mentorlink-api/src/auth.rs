use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use mentorlink_db::UserRepository;
use mentorlink_db::models::NewUser;
use mentorlink_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use mentorlink_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

const TOKEN_TTL_DAYS: i64 = 30;

/// Verified against when a login names an unknown email.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("mentorlink-unknown-account").unwrap_or_default());

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::validation("Name must be between 1 and 100 characters"));
    }
    let email = req.email.trim().to_string();
    if email.len() > 254 || !email.contains('@') {
        return Err(ApiError::validation("Invalid email address"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })??;

    let new_user = NewUser {
        name,
        email,
        password_hash,
        role: req.role,
        school: non_blank(req.school),
        grade: non_blank(req.grade),
    };

    let user = state
        .store
        .call(move |db| db.create_user(&new_user))
        .await?
        .ok_or_else(|| ApiError::Conflict("User already exists".into()))?;

    info!("Registered {} {}", user.role, user.id);

    let token = create_token(&state.jwt_secret, user.id, &user.name, user.role)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email;
    let user = state
        .store
        .call(move |db| db.get_user_by_email(&email))
        .await?;

    // Unknown emails still pay for one verification.
    let stored_hash = match &user {
        Some(user) => user.password.clone(),
        None => DUMMY_HASH.clone(),
    };
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let user = match (user, verified) {
        (Some(user), Ok(true)) => user,
        (Some(_), Err(e)) => return Err(e.into()),
        _ => return Err(ApiError::Unauthenticated),
    };

    let token = create_token(&state.jwt_secret, user.id, &user.name, user.role)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        role: user.role,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, name: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Argon2id PHC string for `password`.
fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn token_carries_identity_and_role() {
        let user_id = Uuid::new_v4();
        let token = create_token("test-secret", user_id, "Bob", Role::Mentor).unwrap();

        let claims = decode_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Mentor);
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        assert!(DUMMY_HASH.starts_with("$argon2id$"));
        assert!(!verify_password("password123", &DUMMY_HASH).unwrap());
    }
}
