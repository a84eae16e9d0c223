//! Ошибки клиента.
//!
//! Один enum на весь крейт: REST, push-соединение, платёжный виджет,
//! конфигурация. Вызывающий код различает варианты, когда ему это важно
//! (например, `Unauthorized` ведёт к logout), остальное просто показывается
//! пользователю через `Display`.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Сетевая ошибка HTTP-клиента (таймаут, DNS, TLS).
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Бэкенд ответил не-2xx и прислал `{"detail": ...}`.
    #[error("{detail}")]
    Api { status: StatusCode, detail: String },

    /// Бэкенд отверг токен (HTTP 401).
    #[error("session expired, please log in again")]
    Unauthorized,

    /// Запрос к защищённому эндпоинту без активной сессии.
    /// Возникает локально, до любого сетевого вызова.
    #[error("please log in to continue")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    Validation(String),

    /// Сообщение платёжного процессора, передаётся пользователю как есть.
    #[error("{0}")]
    Payment(String),

    #[error("payment processor temporarily unavailable")]
    CircuitOpen,

    #[error("push transport error: {0}")]
    Transport(String),

    #[error("malformed push packet: {0}")]
    Codec(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidState(&'static str),
}

impl ClientError {
    /// Текст для показа пользователю в форме.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ClientError::Validation(errors.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_backend_detail_verbatim() {
        let err = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            detail: "Not enough seats available".to_string(),
        };
        assert_eq!(err.user_message(), "Not enough seats available");
    }

    #[test]
    fn payment_error_is_not_decorated() {
        let err = ClientError::Payment("Your card was declined.".to_string());
        assert_eq!(err.to_string(), "Your card was declined.");
    }
}
