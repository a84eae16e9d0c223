use reqwest::StatusCode;
use validator::Validate;

use super::{ApiClient, Authorized, Credentials};
use crate::error::{ClientError, Result};
use crate::models::user::LoginForm;
use crate::models::{Registration, TokenResponse, User};

impl ApiClient {
    /// POST /token: OAuth2 password flow, тело form-urlencoded.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let form = serde_urlencoded::to_string(LoginForm { username, password })
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let request = self
            .post("/token")?
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form);
        // 401 здесь означает неверный пароль, а не истёкшую сессию
        self.send(request).await.map_err(|e| match e {
            ClientError::Unauthorized => ClientError::Api {
                status: StatusCode::UNAUTHORIZED,
                detail: "Incorrect username or password".to_string(),
            },
            other => other,
        })
    }

    /// POST /register
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        registration.validate()?;
        self.send(self.post("/register")?.json(registration)).await
    }

    /// GET /me
    pub async fn me(&self, credentials: &Credentials) -> Result<User> {
        self.send(self.get("/me")?.authorized(credentials)).await
    }
}
