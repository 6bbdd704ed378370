use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use dicomflow_core::models::UserRole;
use dicomflow_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

/// Authenticated caller, stored in request extensions by the auth middleware
#[derive(Debug, Clone, Copy)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl CallerContext {
    /// Gate for every mutating route
    pub fn require_doctor(&self) -> Result<(), AppError> {
        if self.role == UserRole::Doctor {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' may not perform this operation; doctor role required",
                self.role
            )))
        }
    }
}

// Extracted from parts so it can sit next to `Multipart`
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .copied()
            .ok_or_else(|| {
                let err = AppError::Unauthorized("Missing caller context".to_string());
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::from_app_error(&err, false)),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_doctors_pass_the_write_gate() {
        let doctor = CallerContext {
            user_id: Uuid::new_v4(),
            role: UserRole::Doctor,
        };
        assert!(doctor.require_doctor().is_ok());

        for role in [UserRole::Patient, UserRole::Admin] {
            let caller = CallerContext {
                user_id: Uuid::new_v4(),
                role,
            };
            assert!(matches!(caller.require_doctor(), Err(AppError::Forbidden(_))));
        }
    }
}
