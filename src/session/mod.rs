//! Сессия пользователя.
//!
//! Сессия существует, только пока есть токен и `GET /me` ответил успешно.
//! Любая ошибка загрузки текущего пользователя: принудительный logout с
//! очисткой токена. После logout `credentials()` пуст, и защищённые вызовы
//! отклоняются локально, без запроса со старым токеном.

pub mod token_store;

pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use crate::api::{ApiClient, Credentials};
use crate::error::{ClientError, Result};
use crate::models::{Registration, User};
use crate::realtime::ConnectionManager;

#[derive(Debug, Clone)]
pub struct Session {
    pub credentials: Credentials,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Проверяет `exp` без проверки подписи: секрета у клиента нет.
/// Непрозрачный (не JWT) токен считается живым: решит сервер.
pub fn token_expired(token: &str, now: i64) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp.is_some_and(|exp| exp <= now),
        Err(_) => false,
    }
}

pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    connection: ConnectionManager,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>, connection: ConnectionManager) -> Self {
        Self {
            api,
            store,
            connection,
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current().map(|session| session.user)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.current().map(|session| session.credentials)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Учётные данные для защищённого экрана или `Unauthenticated`.
    pub fn require_credentials(&self) -> Result<Credentials> {
        self.credentials().ok_or(ClientError::Unauthenticated)
    }

    /// POST /token, сохранение токена, затем GET /me.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let token = self.api.login(username, password).await?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            warn!("Unexpected token type '{}', using it as bearer", token.token_type);
        }
        self.store.save(&token.access_token).await?;
        self.load_user(Credentials::bearer(token.access_token)).await
    }

    /// POST /register. Вход после регистрации: отдельным `login`.
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        let user = self.api.register(registration).await?;
        info!("Registered user {}", user.username);
        Ok(user)
    }

    /// Восстанавливает сессию из сохранённого токена при старте.
    pub async fn restore(&self) -> Result<Option<User>> {
        let Some(token) = self.store.load().await? else {
            return Ok(None);
        };
        if token_expired(&token, Utc::now().timestamp()) {
            info!("Stored token has expired, clearing it");
            self.logout().await;
            return Ok(None);
        }
        self.load_user(Credentials::bearer(token)).await.map(Some)
    }

    /// Перечитывает текущего пользователя (GET /me).
    pub async fn refresh_user(&self) -> Result<User> {
        let credentials = self.require_credentials()?;
        self.load_user(credentials).await
    }

    pub async fn logout(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear stored token: {}", e);
        }
        self.connection.forget_identity();
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous {
            info!("User {} logged out", session.user.username);
        }
    }

    /// Реакция экранов на ошибку защищённого вызова: 401 завершает сессию.
    pub async fn handle_error(&self, error: &ClientError) {
        if matches!(error, ClientError::Unauthorized) {
            warn!("Backend rejected the session token, logging out");
            self.logout().await;
        }
    }

    async fn load_user(&self, credentials: Credentials) -> Result<User> {
        match self.api.me(&credentials).await {
            Ok(user) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Session {
                    credentials,
                    user: user.clone(),
                });
                self.connection.authenticate(&user.username);
                info!("Logged in as {}", user.username);
                Ok(user)
            }
            Err(e) => {
                warn!("Failed to load current user, logging out: {}", e);
                self.logout().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn jwt(exp: i64) -> String {
        encode(
            &Header::default(),
            &TestClaims { sub: "ann".to_string(), exp },
            &EncodingKey::from_secret(b"server-secret"),
        )
        .unwrap()
    }

    #[test]
    fn expired_jwt_is_detected_without_the_secret() {
        let now = 1_800_000_000;
        assert!(token_expired(&jwt(now - 1), now));
        assert!(!token_expired(&jwt(now + 60), now));
    }

    #[test]
    fn opaque_tokens_are_left_to_the_server() {
        assert!(!token_expired("not-a-jwt", 0));
    }
}
