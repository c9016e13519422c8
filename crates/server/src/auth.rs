//! Credentials and session tokens.
//!
//! Passwords are stored as `salt:hash`, both hex, PBKDF2-HMAC-SHA256 with
//! 100_000 rounds. Sessions are HS256 JWTs valid for seven days. Login
//! failures are indistinguishable between unknown user and wrong password.

use api_types::auth::{LoginRequest, LoginResponse, UserInfo};
use axum::{Extension, Json, extract::State};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    ServerError,
    server::{AuthIdentity, ServerState},
    users,
};

const PBKDF2_ROUNDS: u32 = 100_000;
const TOKEN_VALIDITY_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> String {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);

    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ROUNDS,
        &mut derived,
    );
    format!("{salt}:{}", hex::encode(derived))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once(':') else {
        return false;
    };
    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ROUNDS,
        &mut derived,
    );
    hex::encode(derived) == expected
}

/// 32 random bytes, hex encoded.
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn issue_jwt(secret: &str, user: &users::Model) -> Result<String, ServerError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::days(TOKEN_VALIDITY_DAYS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ServerError::Internal(format!("jwt signing failed: {err}")))
}

pub fn verify_jwt(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let username = payload.username.trim();

    let mut user = users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(&state.db)
        .await
        .map_err(engine::EngineError::from)?;

    // First-run bootstrap: the configured admin account materializes the
    // first time its exact credentials are presented.
    if user.is_none()
        && let (Some(admin_user), Some(admin_pass)) =
            (&state.config.admin_username, &state.config.admin_password)
        && username == admin_user
        && payload.password == *admin_pass
    {
        let model = users::ActiveModel {
            id: ActiveValue::NotSet,
            username: ActiveValue::Set(admin_user.clone()),
            password_hash: ActiveValue::Set(hash_password(admin_pass)),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(&state.db)
        .await
        .map_err(engine::EngineError::from)?;
        tracing::info!(username = %model.username, "admin account bootstrapped");
        user = Some(model);
    }

    let user = user.ok_or(ServerError::Auth)?;
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ServerError::Auth);
    }

    let token = issue_jwt(&state.config.jwt_secret, &user)?;
    Ok(Json(LoginResponse {
        token,
        user: UserInfo {
            id: user.id,
            username: user.username,
        },
    }))
}

pub async fn me(
    Extension(identity): Extension<AuthIdentity>,
) -> Result<Json<UserInfo>, ServerError> {
    match identity {
        AuthIdentity::User(user) => Ok(Json(UserInfo {
            id: user.id,
            username: user.username,
        })),
        AuthIdentity::ApiToken(_) => Err(ServerError::Auth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-valid-entry"));
    }

    #[test]
    fn jwt_round_trips_and_rejects_wrong_secret() {
        let user = users::Model {
            id: 7,
            username: "alice".to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let token = issue_jwt("secret", &user).ok().unwrap();

        let claims = verify_jwt("secret", &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "alice");

        assert!(verify_jwt("other", &token).is_none());
    }

    #[test]
    fn api_tokens_are_64_hex_chars() {
        let token = generate_api_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
