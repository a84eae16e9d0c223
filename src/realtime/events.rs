//! Типизированные push-события.
//!
//! Имена событий на проводе: строки; внутри клиента: закрытый набор
//! `EventKind`, по которому идёт подписка.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::Result;
use crate::models::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewEvent,
    SeatsUpdated,
    BookingUpdate,
    UsersOnline,
    Authenticated,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::NewEvent,
        EventKind::SeatsUpdated,
        EventKind::BookingUpdate,
        EventKind::UsersOnline,
        EventKind::Authenticated,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::NewEvent => "new_event",
            EventKind::SeatsUpdated => "seats_updated",
            EventKind::BookingUpdate => "booking_update",
            EventKind::UsersOnline => "users_online",
            EventKind::Authenticated => "authenticated",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// `seats_updated`: новое число свободных мест для одного события.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatsUpdate {
    pub event_id: i64,
    pub available_seats: u32,
    #[serde(default)]
    pub total_seats: Option<u32>,
}

/// `booking_update`: кто-то забронировал места на событие.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingUpdate {
    pub event_id: i64,
    #[serde(default)]
    pub event_title: Option<String>,
    #[serde(default)]
    pub booked_by: Option<String>,
    pub seats_booked: u32,
    pub available_seats: u32,
    pub total_seats: u32,
}

/// `users_online`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUsers {
    pub count: u32,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NewEvent(Event),
    SeatsUpdated(SeatsUpdate),
    BookingUpdate(BookingUpdate),
    UsersOnline(OnlineUsers),
    Authenticated { username: String },
}

#[derive(Deserialize)]
struct AuthenticatedPayload {
    username: String,
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::NewEvent(_) => EventKind::NewEvent,
            PushEvent::SeatsUpdated(_) => EventKind::SeatsUpdated,
            PushEvent::BookingUpdate(_) => EventKind::BookingUpdate,
            PushEvent::UsersOnline(_) => EventKind::UsersOnline,
            PushEvent::Authenticated { .. } => EventKind::Authenticated,
        }
    }

    /// Разбирает событие по имени. `Ok(None)`: событие нам не интересно.
    pub fn from_wire(name: &str, data: Value) -> Result<Option<Self>> {
        let Some(kind) = EventKind::from_wire(name) else {
            return Ok(None);
        };
        let event = match kind {
            EventKind::NewEvent => PushEvent::NewEvent(serde_json::from_value(data)?),
            EventKind::SeatsUpdated => PushEvent::SeatsUpdated(serde_json::from_value(data)?),
            EventKind::BookingUpdate => PushEvent::BookingUpdate(serde_json::from_value(data)?),
            EventKind::UsersOnline => PushEvent::UsersOnline(serde_json::from_value(data)?),
            EventKind::Authenticated => {
                let payload: AuthenticatedPayload = serde_json::from_value(data)?;
                PushEvent::Authenticated { username: payload.username }
            }
        };
        Ok(Some(event))
    }
}

/// Исходящие объявления. Доставка не гарантируется.
#[derive(Debug, Clone, PartialEq)]
pub enum Announcement {
    Authenticate { username: String },
    JoinEventRoom { event_id: i64 },
    LeaveEventRoom { event_id: i64 },
}

impl Announcement {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Announcement::Authenticate { .. } => "authenticate",
            Announcement::JoinEventRoom { .. } => "join_event_room",
            Announcement::LeaveEventRoom { .. } => "leave_event_room",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Announcement::Authenticate { username } => json!({ "username": username }),
            Announcement::JoinEventRoom { event_id } | Announcement::LeaveEventRoom { event_id } => {
                json!({ "event_id": event_id })
            }
        }
    }
}
