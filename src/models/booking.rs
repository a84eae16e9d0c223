use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    #[serde(alias = "confirmed")]
    Paid,
    Cancelled,
}

/// Бронь. После подтверждения оплаты клиент её не меняет.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub event_id: i64,
    pub seats: u32,
    pub total_amount: f64,
    pub booking_date: NaiveDateTime,
    pub status: BookingStatus,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Тело `POST /bookings` и `POST /create-payment-intent`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BookingRequest {
    pub event_id: i64,
    pub seats: u32,
}

/// Ответ `POST /create-payment-intent`: секрет для виджета и id брони в статусе pending.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub client_secret: String,
    pub booking_id: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Success,
    Pending,
}

/// Ответ `POST /confirm-payment/{booking_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub status: ConfirmationStatus,
    #[serde(default)]
    pub booking: Option<Booking>,
}
