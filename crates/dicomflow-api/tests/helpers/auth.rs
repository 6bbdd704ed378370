use chrono::{Duration, Utc};
use dicomflow_api::auth::JwtClaims;
use dicomflow_core::models::UserRole;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

/// Secret shared by the test app and the tokens minted here
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

pub struct TestUser {
    pub id: Uuid,
    pub role: UserRole,
    pub token: String,
}

impl TestUser {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self {
            id,
            role,
            token: token_for(id, &role.to_string()),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub fn token_for(user_id: Uuid, role: &str) -> String {
    sign(user_id, role, Duration::hours(1), TEST_JWT_SECRET)
}

pub fn expired_token_for(user_id: Uuid, role: &str) -> String {
    sign(user_id, role, Duration::hours(-1), TEST_JWT_SECRET)
}

pub fn sign(user_id: Uuid, role: &str, valid_for: Duration, secret: &str) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        role: role.to_string(),
        exp: (now + valid_for).timestamp(),
        iat: now.timestamp(),
        nbf: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}
