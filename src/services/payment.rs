//! payment.rs
//!
//! Клиентская сторона платёжного процессора.
//!
//! Ключевые компоненты:
//! 1.  **CircuitBreaker**: "Автоматический выключатель" для обращений к
//!     процессору. После серии сетевых сбоев запросы временно блокируются.
//! 2.  **PaymentWidget**: шов для размещённого платёжного виджета. Получает
//!     client secret платёжного намерения и подтверждает оплату; ошибки
//!     процессора возвращаются пользователю дословно.
//! 3.  **ProcessorWidget**: реализация виджета через публичный REST API
//!     процессора (publishable key, подтверждение payment intent).

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};
use crate::error::{ClientError, Result};

/// Состояния "Автоматического выключателя" (Circuit Breaker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// **Closed (Замкнуто)**: Нормальный режим работы. Запросы разрешены.
    Closed,
    /// **Open (Разомкнуто)**: Запросы временно запрещены после серии сбоев.
    Open,
    /// **HalfOpen (Полуоткрыто)**: После таймаута пропускаем пробный запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    /// Текущее состояние (Closed, Open, HalfOpen).
    state: RwLock<CircuitState>,
    /// Счетчик последовательных сбоев.
    failure_count: AtomicU32,
    /// Момент последнего сбоя, миллисекунды от `epoch`.
    last_failure_ms: AtomicU64,
    epoch: Instant,
    /// Порог сбоев, после которого выключатель размыкается.
    failure_threshold: u32,
    /// Сколько ждать в Open перед пробным запросом.
    timeout_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            epoch: Instant::now(),
            failure_threshold: failure_threshold.max(1),
            timeout_duration: timeout,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, Duration::from_secs(config.timeout_seconds))
    }

    fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Проверяет, можно ли выполнить следующий запрос.
    pub fn can_execute(&self) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let since_failure = self
                    .elapsed_ms()
                    .saturating_sub(self.last_failure_ms.load(Ordering::Relaxed));
                // Таймаут истёк: пропускаем один пробный запрос
                if since_failure >= self.timeout_duration.as_millis() as u64 {
                    *state = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        if *state != CircuitState::Open {
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_ms.store(self.elapsed_ms(), Ordering::Relaxed);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CircuitState::Closed if failure_count >= self.failure_threshold => {
                *state = CircuitState::Open;
                error!(
                    "Circuit breaker OPENED - {} failures reached threshold {}",
                    failure_count, self.failure_threshold
                );
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn get_state(&self) -> CircuitState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }
}

/// Размещённый платёжный виджет.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    /// Подтверждает оплату по client secret. `Err(ClientError::Payment)`
    /// несёт сообщение процессора без изменений.
    async fn confirm(&self, client_secret: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ProcessorErrorBody {
    error: ProcessorErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProcessorErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IntentStatus {
    status: String,
}

pub struct ProcessorWidget {
    base_url: String,
    publishable_key: String,
    payment_method: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl ProcessorWidget {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Result<Self> {
        Ok(Self {
            base_url: payment.gateway_url.trim_end_matches('/').to_string(),
            publishable_key: payment.publishable_key.clone(),
            payment_method: payment.payment_method.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            circuit_breaker: Arc::new(CircuitBreaker::from_config(breaker)),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.get_state()
    }

    /// Идентификатор намерения: часть client secret до `_secret_`.
    fn intent_id(client_secret: &str) -> Result<&str> {
        match client_secret.split_once("_secret_") {
            Some((id, _)) if !id.is_empty() => Ok(id),
            _ => Err(ClientError::Payment("Invalid payment client secret".to_string())),
        }
    }

    async fn send_confirmation(&self, intent_id: &str, client_secret: &str) -> Result<()> {
        let response = self
            .http_client
            .post(format!("{}/v1/payment_intents/{}/confirm", self.base_url, intent_id))
            .bearer_auth(&self.publishable_key)
            .form(&[
                ("client_secret", client_secret),
                ("payment_method", self.payment_method.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ClientError::Transport(format!("payment processor returned {}", status)));
        }
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProcessorErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Payment failed ({})", status));
            return Err(ClientError::Payment(message));
        }

        let intent: IntentStatus = serde_json::from_str(&body)?;
        match intent.status.as_str() {
            "succeeded" | "processing" => Ok(()),
            other => Err(ClientError::Payment(format!(
                "Payment could not be completed (status: {})",
                other
            ))),
        }
    }
}

#[async_trait]
impl PaymentWidget for ProcessorWidget {
    async fn confirm(&self, client_secret: &str) -> Result<()> {
        let intent_id = Self::intent_id(client_secret)?;

        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment confirmation");
            return Err(ClientError::CircuitOpen);
        }

        info!("Confirming payment intent {}", intent_id);
        match self.send_confirmation(intent_id, client_secret).await {
            // Отказ по карте: ответ процессора, а не сбой канала
            Err(e @ (ClientError::Http(_) | ClientError::Transport(_))) => {
                error!("Payment processor request failed: {}", e);
                self.circuit_breaker.record_failure();
                Err(e)
            }
            other => {
                self.circuit_breaker.record_success();
                other
            }
        }
    }
}
