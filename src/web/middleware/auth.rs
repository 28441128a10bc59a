use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::warn;

use crate::web::error::AppError;
use crate::web::models::{AuthenticatedUser, Claims};
use crate::web::AppState;

/// Bearer token from the Authorization header, falling back to the `token`
/// cookie. On success an `AuthenticatedUser` extension is attached.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| jar.get("token").map(|c| c.value().to_string()))
        .ok_or(AppError::InvalidCredentials)?;

    let user = decode_token(&token, &state.config.jwt_secret)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Shared with the WebSocket handler, which carries its token in the query
/// string instead of a header.
pub fn decode_token(token: &str, jwt_secret: &str) -> Result<AuthenticatedUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected request with an undecodable token.");
        AppError::InvalidCredentials
    })?;
    Ok(AuthenticatedUser {
        id: data.claims.user_id,
        username: data.claims.sub,
    })
}
