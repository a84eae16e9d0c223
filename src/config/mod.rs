use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClientError, Result};

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub session: SessionConfig,
    pub notifications: NotificationConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
}

// Настройки REST API бэкенда
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub page_size: u32,
}

// Настройки push-соединения (Socket.IO)
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub socket_url: String,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
}

// Где хранится токен между запусками
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub token_path: PathBuf,
}

// Всплывающие уведомления
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub capacity: usize,
    pub ttl_seconds: u64,
}

// Настройки платёжного процессора (публичный ключ, не секретный)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub gateway_url: String,
    pub publishable_key: String,
    pub payment_method: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl RealtimeConfig {
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

impl NotificationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { capacity: 5, ttl_seconds: 5 }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, timeout_seconds: 60 }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: &str) -> Result<T> {
    var_or(key, default)
        .parse()
        .map_err(|_| ClientError::Config(format!("{} must be a valid value", key)))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app: AppConfig {
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "booking_client=debug"),
            },
            api: ApiConfig {
                base_url: var_or("API_BASE_URL", "http://localhost:8000"),
                timeout_seconds: parse_or("API_TIMEOUT_SECONDS", "30")?,
                page_size: parse_or("EVENTS_PAGE_SIZE", "10")?,
            },
            realtime: RealtimeConfig {
                socket_url: var_or("SOCKET_URL", "ws://localhost:8000"),
                reconnect_base_ms: parse_or("SOCKET_RECONNECT_BASE_MS", "1000")?,
                reconnect_max_ms: parse_or("SOCKET_RECONNECT_MAX_MS", "30000")?,
            },
            session: SessionConfig {
                token_path: PathBuf::from(var_or("TOKEN_PATH", ".booking_token")),
            },
            notifications: NotificationConfig {
                capacity: parse_or("NOTIFICATIONS_CAPACITY", "5")?,
                ttl_seconds: parse_or("NOTIFICATIONS_TTL_SECONDS", "5")?,
            },
            payment: PaymentConfig {
                gateway_url: var_or("PAYMENT_GATEWAY_URL", "https://api.stripe.com"),
                publishable_key: var_or("PAYMENT_PUBLISHABLE_KEY", ""),
                payment_method: var_or("PAYMENT_METHOD", "pm_card_visa"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parse_or("CIRCUIT_BREAKER_FAILURE_THRESHOLD", "5")?,
                timeout_seconds: parse_or("CIRCUIT_BREAKER_TIMEOUT_SECONDS", "60")?,
            },
        })
    }
}
