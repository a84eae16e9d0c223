use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Событие, как его отдаёт `GET /events` и пушит `new_event`.
///
/// `available_seats` пишет только сервер: клиент никогда не считает его сам.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub date: NaiveDateTime,
    pub price: f64,
    pub total_seats: u32,
    pub available_seats: u32,
    /// Есть только в push-событии `new_event`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Event {
    pub fn is_sold_out(&self) -> bool {
        self.available_seats == 0
    }
}

/// Тело `POST /events`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub date: NaiveDateTime,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 1))]
    pub total_seats: u32,
}

/// Пагинация списка событий (`skip`/`limit` на бэкенде).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventsQuery {
    pub skip: u32,
    pub limit: u32,
}
