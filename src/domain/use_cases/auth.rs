use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::entities::token::AuthResponse;
use crate::entities::user::{LoginUser, NewUser, User};
use crate::errors::{AppError, AuthError};
use crate::repositories::token::TokenServiceRepository;
use crate::repositories::user::UserRepository;

pub struct AuthHandler<R, T>
where
    R: UserRepository,
    T: TokenServiceRepository,
{
    pub user_repo: R,
    pub token_service: T,
}

impl<R, T> AuthHandler<R, T>
where
    R: UserRepository,
    T: TokenServiceRepository,
{
    pub fn new(user_repo: R, token_service: T) -> Self {
        AuthHandler {
            user_repo,
            token_service,
        }
    }

    /// Registers a new user and signs them in
    pub async fn register(&self, request: NewUser) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let hashed_password = hash_password(&request.password)?;
        let user_insert = request.prepare_for_insert(hashed_password);

        let user = match self.user_repo.create_user(&user_insert).await {
            Ok(user) => user,
            Err(AppError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => {
                tracing::error!("Failed to create user: {}", e);
                return Err(AuthError::Internal("Could not create user".to_string()));
            }
        };

        tracing::info!(user_id = %user.id, "User registered");
        self.create_auth_response(&user)
    }

    /// Logs in a user by validating credentials
    pub async fn login(&self, request: LoginUser) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        let user = self.user_repo.get_user_by_username(request.username.trim())
            .await
            .map_err(|e| {
                tracing::error!("User lookup failed: {}", e);
                AuthError::WrongCredentials
            })?
            .ok_or(AuthError::WrongCredentials)?;

        let is_password_valid = verify_password(&request.password, &user.password_hash)
            .map_err(|_| AuthError::WrongCredentials)?;
        if !is_password_valid {
            return Err(AuthError::WrongCredentials);
        }

        let response = self.create_auth_response(&user)?;

        tracing::info!(user_id = %user.id, "User logged in successfully");
        Ok(response)
    }

    pub fn create_auth_response(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let access_token = self.token_service.create_jwt(user)
            .map_err(|e| {
                tracing::warn!("Failed to create JWT: {}", e);
                AuthError::TokenCreation
            })?;

        Ok(AuthResponse::new(access_token, self.token_service.expires_in()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::repositories::token::MockTokenServiceRepository;
    use crate::repositories::user::MockUserRepository;

    fn token_service() -> MockTokenServiceRepository {
        let mut tokens = MockTokenServiceRepository::new();
        tokens.expect_create_jwt().returning(|_| Ok("signed.jwt.token".to_string()));
        tokens.expect_expires_in().return_const(1800_i64);
        tokens
    }

    fn stored_user(username: &str, password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: hash_password(password).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn register_returns_token() {
        let mut repo = MockUserRepository::new();
        repo.expect_create_user()
            .withf(|insert| insert.username == "ada" && insert.password_hash.starts_with("$argon2id$"))
            .times(1)
            .returning(|insert| Ok(User {
                id: Uuid::new_v4(),
                username: insert.username.clone(),
                password_hash: insert.password_hash.clone(),
                created_at: insert.created_at,
            }));

        let handler = AuthHandler::new(repo, token_service());
        let response = handler
            .register(NewUser { username: " ada ".into(), password: "long enough password".into() })
            .await
            .unwrap();

        assert_eq!(response.access_token, "signed.jwt.token");
        assert_eq!(response.token_type, "bearer");
        assert_eq!(response.expires_in, 1800);
    }

    #[tokio::test]
    async fn duplicate_username_is_reported() {
        let mut repo = MockUserRepository::new();
        repo.expect_create_user()
            .returning(|_| Err(AppError::Conflict("Username already taken".into())));

        let handler = AuthHandler::new(repo, token_service());
        let result = handler
            .register(NewUser { username: "ada".into(), password: "long enough password".into() })
            .await;

        assert!(matches!(result, Err(AuthError::UsernameTaken)));
    }

    #[tokio::test]
    async fn short_password_never_reaches_the_repository() {
        let mut repo = MockUserRepository::new();
        repo.expect_create_user().times(0);

        let handler = AuthHandler::new(repo, token_service());
        let result = handler
            .register(NewUser { username: "ada".into(), password: "short".into() })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let user = stored_user("ada", "the right password");
        let mut repo = MockUserRepository::new();
        repo.expect_get_user_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let handler = AuthHandler::new(repo, token_service());
        let result = handler
            .login(LoginUser { username: "ada".into(), password: "the wrong password".into() })
            .await;

        assert!(matches!(result, Err(AuthError::WrongCredentials)));
    }

    #[tokio::test]
    async fn login_with_unknown_user_fails() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_user_by_username().returning(|_| Ok(None));

        let handler = AuthHandler::new(repo, token_service());
        let result = handler
            .login(LoginUser { username: "ghost".into(), password: "whatever".into() })
            .await;

        assert!(matches!(result, Err(AuthError::WrongCredentials)));
    }

    #[tokio::test]
    async fn login_with_right_password_issues_token() {
        let user = stored_user("ada", "the right password");
        let mut repo = MockUserRepository::new();
        repo.expect_get_user_by_username()
            .withf(|username| username == "ada")
            .returning(move |_| Ok(Some(user.clone())));

        let handler = AuthHandler::new(repo, token_service());
        let response = handler
            .login(LoginUser { username: "ada".into(), password: "the right password".into() })
            .await
            .unwrap();

        assert_eq!(response.access_token, "signed.jwt.token");
    }
}
