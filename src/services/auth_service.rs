use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use sea_orm::DatabaseConnection;

use crate::db::entities::user;
use crate::db::services::user_service;
use crate::web::error::AppError;
use crate::web::models::{Claims, LoginRequest, LoginResponse, RegisterRequest, UserResponse};

const TOKEN_LIFETIME_HOURS: i64 = 24;
const MIN_PASSWORD_LEN: usize = 8;

pub async fn register_user(
    db: &DatabaseConnection,
    req: RegisterRequest,
) -> Result<UserResponse, AppError> {
    if req.username.trim().is_empty() {
        return Err(AppError::Validation(
            "Username must not be empty".to_string(),
        ));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))?;
    let user = user_service::create_user(db, req.username.trim(), password_hash, req.email).await?;

    Ok(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        first_login: user.first_login,
    })
}

pub async fn login_user(
    db: &DatabaseConnection,
    req: LoginRequest,
    jwt_secret: &str,
) -> Result<LoginResponse, AppError> {
    let user = user_service::find_by_username(db, &req.username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {e}")))?;
    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    create_jwt_for_user(&user, jwt_secret)
}

pub fn create_jwt_for_user(
    user: &user::Model,
    jwt_secret: &str,
) -> Result<LoginResponse, AppError> {
    let expiration = (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id.clone(),
        exp: expiration,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Token creation failed: {e}")))?;

    Ok(LoginResponse {
        token,
        username: user.username.clone(),
        first_login: user.first_login,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            username: "admin".to_string(),
            password: "correct horse battery".to_string(),
            email: None,
        }
    }

    #[tokio::test]
    async fn register_then_login_issues_a_decodable_token() {
        let db = connect_test_db().await;
        let registered = register_user(&db, register_request()).await.expect("register");
        assert!(registered.first_login);

        let login = login_user(
            &db,
            LoginRequest {
                username: "admin".to_string(),
                password: "correct horse battery".to_string(),
            },
            "test-secret",
        )
        .await
        .expect("login");
        assert_eq!(login.username, "admin");

        let decoded = decode::<Claims>(
            &login.token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .expect("decode");
        assert_eq!(decoded.claims.sub, "admin");
        assert_eq!(decoded.claims.user_id, registered.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_invalid_credentials() {
        let db = connect_test_db().await;
        register_user(&db, register_request()).await.expect("register");

        let wrong = login_user(
            &db,
            LoginRequest {
                username: "admin".to_string(),
                password: "nope nope nope".to_string(),
            },
            "test-secret",
        )
        .await;
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

        let unknown = login_user(
            &db,
            LoginRequest {
                username: "ghost".to_string(),
                password: "whatever-pass".to_string(),
            },
            "test-secret",
        )
        .await;
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn short_passwords_and_duplicate_usernames_are_rejected() {
        let db = connect_test_db().await;

        let mut short = register_request();
        short.password = "short".to_string();
        assert!(matches!(
            register_user(&db, short).await,
            Err(AppError::Validation(_))
        ));

        register_user(&db, register_request()).await.expect("register");
        assert!(matches!(
            register_user(&db, register_request()).await,
            Err(AppError::Conflict(_))
        ));
    }
}
