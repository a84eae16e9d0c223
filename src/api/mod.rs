//! REST-клиент бэкенда бронирования.
//!
//! Учётные данные передаются в каждый защищённый вызов явно (`&Credentials`),
//! никаких глобальных заголовков по умолчанию. Без сессии защищённый вызов
//! просто нечем сделать.

#[cfg(feature = "admin")]
pub mod admin;
pub mod auth;
pub mod bookings;
pub mod events;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{ClientError, Result};

/// Bearer-токен текущей сессии.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

// Токен в логи не попадает
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("token", &"<redacted>").finish()
    }
}

/// Тело ошибки FastAPI: `detail` бывает строкой или списком ошибок валидации.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl ErrorBody {
    fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    page_size: u32,
}

impl ApiClient {
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Self::with_client(http, &config.base_url, config.page_size)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, page_size: u32) -> Result<Self> {
        // Без завершающего слэша join() отрезал бы последний сегмент пути
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::Config(format!("API_BASE_URL: {}", e)))?;
        Ok(Self { http, base_url, page_size })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(format!("bad endpoint path {}: {}", path, e)))
    }

    pub(crate) fn get(&self, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.get(self.url(path)?))
    }

    pub(crate) fn post(&self, path: &str) -> Result<RequestBuilder> {
        Ok(self.http.post(self.url(path)?))
    }

    /// Отправляет запрос и разбирает JSON-ответ, превращая ошибки бэкенда в `ClientError`.
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = Self::checked(request).await?;
        Ok(response.json::<T>().await?)
    }

    pub(crate) async fn checked(request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message())
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body
                }
            });
        debug!("API error {}: {}", status, detail);
        Err(ClientError::Api { status, detail })
    }
}

pub(crate) trait Authorized {
    fn authorized(self, credentials: &Credentials) -> Self;
}

impl Authorized for RequestBuilder {
    fn authorized(self, credentials: &Credentials) -> Self {
        self.bearer_auth(credentials.token())
    }
}
