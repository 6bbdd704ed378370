use crate::auth::models::{CallerContext, JwtClaims};
use dicomflow_core::models::UserRole;
use dicomflow_core::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

/// Verifies HS256 bearer tokens signed with the shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AppError> {
        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::Unauthorized("Token has expired".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                        AppError::Unauthorized("Token is not yet valid (nbf)".to_string())
                    }
                    _ => AppError::Unauthorized(format!("Invalid or expired token: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }

    /// Validate a token and resolve the caller it names
    pub fn authenticate(&self, token: &str) -> Result<CallerContext, AppError> {
        let claims = self.validate_token(token)?;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| AppError::Unauthorized("Invalid user role".to_string()))?;

        Ok(CallerContext {
            user_id: claims.sub,
            role,
        })
    }
}
