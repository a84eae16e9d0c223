#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use booking_client::api::ApiClient;
use booking_client::error::{ClientError, Result};
use booking_client::realtime::{ConnectionManager, MemoryTransport};
use booking_client::services::payment::PaymentWidget;

pub fn event_json(id: i64, available: u32, total: u32) -> Value {
    json!({
        "id": id,
        "title": format!("Event {}", id),
        "description": "Live music",
        "venue": "Main Hall",
        "date": "2026-11-20T19:30:00",
        "price": 25.0,
        "total_seats": total,
        "available_seats": available,
    })
}

pub fn user_json(username: &str) -> Value {
    json!({
        "id": 7,
        "email": format!("{}@example.com", username),
        "username": username,
        "full_name": null,
        "is_active": true,
    })
}

pub fn booking_json(id: i64, event_id: i64, seats: u32, status: &str) -> Value {
    json!({
        "id": id,
        "event_id": event_id,
        "seats": seats,
        "total_amount": 25.0 * seats as f64,
        "booking_date": "2026-10-19T12:00:00",
        "status": status,
        "payment_intent_id": "pi_123",
    })
}

pub fn api(base_url: &str) -> ApiClient {
    ApiClient::with_client(reqwest::Client::new(), base_url, 10).unwrap()
}

pub async fn connected() -> (ConnectionManager, MemoryTransport) {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(Arc::new(transport.clone()));
    manager.connect().await.unwrap();
    (manager, transport)
}

/// Даёт задаче-насосу разобрать очередь.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn next_value<T: Clone>(rx: &mut watch::Receiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("no update within 2s")
        .expect("sender dropped");
    rx.borrow_and_update().clone()
}

/// Виджет оплаты с заранее заданным исходом.
pub struct StubWidget {
    outcome: Mutex<Option<String>>,
    calls: AtomicUsize,
    secrets: Mutex<Vec<String>>,
}

impl StubWidget {
    pub fn approving() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(None),
            calls: AtomicUsize::new(0),
            secrets: Mutex::new(Vec::new()),
        })
    }

    pub fn declining(message: &str) -> Arc<Self> {
        let widget = Self::approving();
        *widget.outcome.lock().unwrap() = Some(message.to_string());
        widget
    }

    pub fn approve_from_now(&self) {
        *self.outcome.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn secrets(&self) -> Vec<String> {
        self.secrets.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentWidget for StubWidget {
    async fn confirm(&self, client_secret: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.secrets.lock().unwrap().push(client_secret.to_string());
        match self.outcome.lock().unwrap().clone() {
            Some(message) => Err(ClientError::Payment(message)),
            None => Ok(()),
        }
    }
}
