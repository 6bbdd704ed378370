use crate::auth::jwt::JwtVerifier;
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dicomflow_core::AppError;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: JwtVerifier,
}

/// Resolves `Authorization: Bearer <jwt>` into a [`CallerContext`](crate::auth::CallerContext)
/// extension; anything else is a 401.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return HttpAppError(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ))
        .into_response();
    };

    match auth_state.verifier.authenticate(token.trim()) {
        Ok(caller) => {
            tracing::debug!(user_id = %caller.user_id, role = %caller.role, "Caller authenticated");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(err) => HttpAppError(err).into_response(),
    }
}
