//! booking_flow.rs
//!
//! Машина состояний покупки билета:
//!
//! `Browsing` → `SeatSelection` → `PaymentPending` → `Confirmed`
//!                                            ↘ `Failed` → (retry) `SeatSelection`
//!
//! Ошибки не вылетают из `submit` наружу, а становятся состоянием `Failed` с
//! текстом для пользователя. Число свободных мест локально не уменьшается:
//! его обновит push-событие `seats_updated` от сервера.
//!
//! С подключённым `ConnectionManager` поток входит в комнату выбранного
//! события: `booking_update` сервер шлёт только в комнату `event_{id}`.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiClient, Credentials};
use crate::error::{ClientError, Result};
use crate::models::{Booking, BookingRequest, ConfirmationStatus, Event};
use crate::realtime::ConnectionManager;
use crate::services::payment::PaymentWidget;

pub const LOGIN_PROMPT: &str = "Please log in to book tickets";
pub const SOLD_OUT_PROMPT: &str = "This event is sold out";

#[derive(Debug, Clone, PartialEq)]
pub enum BookingState {
    Browsing,
    SeatSelection {
        event: Event,
        seats: u32,
        /// Подсказка под формой: просьба войти, ошибка прошлой попытки.
        prompt: Option<String>,
    },
    PaymentPending {
        event: Event,
        seats: u32,
        booking_id: Option<i64>,
    },
    Confirmed {
        booking: Booking,
    },
    Failed {
        event: Event,
        seats: u32,
        message: String,
    },
}

impl BookingState {
    pub fn name(&self) -> &'static str {
        match self {
            BookingState::Browsing => "browsing",
            BookingState::SeatSelection { .. } => "seat-selection",
            BookingState::PaymentPending { .. } => "payment-pending",
            BookingState::Confirmed { .. } => "confirmed",
            BookingState::Failed { .. } => "failed",
        }
    }
}

pub struct BookingFlow {
    api: ApiClient,
    widget: Arc<dyn PaymentWidget>,
    connection: Option<ConnectionManager>,
    room: Option<i64>,
    state: BookingState,
}

impl BookingFlow {
    pub fn new(api: ApiClient, widget: Arc<dyn PaymentWidget>) -> Self {
        Self {
            api,
            widget,
            connection: None,
            room: None,
            state: BookingState::Browsing,
        }
    }

    /// Входить в комнату выбранного события, чтобы получать его `booking_update`.
    pub fn with_connection(mut self, connection: ConnectionManager) -> Self {
        self.connection = Some(connection);
        self
    }

    fn enter_room(&mut self, event_id: i64) {
        if self.room == Some(event_id) {
            return;
        }
        self.leave_room();
        if let Some(connection) = &self.connection {
            connection.join_event_room(event_id);
            self.room = Some(event_id);
        }
    }

    fn leave_room(&mut self) {
        if let (Some(connection), Some(event_id)) = (&self.connection, self.room.take()) {
            connection.leave_event_room(event_id);
        }
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    /// Browsing → SeatSelection с одним местом.
    pub fn select(&mut self, event: Event) -> Result<()> {
        match self.state {
            BookingState::Browsing | BookingState::Confirmed { .. } => {
                self.enter_room(event.id);
                self.state = BookingState::SeatSelection { event, seats: 1, prompt: None };
                Ok(())
            }
            _ => Err(ClientError::InvalidState("a booking is already in progress")),
        }
    }

    pub fn set_seats(&mut self, requested: u32) -> Result<()> {
        let BookingState::SeatSelection { event, seats, .. } = &mut self.state else {
            return Err(ClientError::InvalidState("seats can only be chosen during seat selection"));
        };
        if requested == 0 || requested > event.available_seats {
            return Err(ClientError::Validation(format!(
                "choose between 1 and {} seats",
                event.available_seats
            )));
        }
        *seats = requested;
        Ok(())
    }

    /// Свежие данные о событии (например, после `seats_updated`), пока идёт выбор мест.
    pub fn refresh_event(&mut self, updated: &Event) {
        if let BookingState::SeatSelection { event, seats, .. } = &mut self.state {
            if event.id == updated.id {
                *event = updated.clone();
                *seats = (*seats).min(updated.available_seats.max(1));
            }
        }
    }

    /// Оплата: намерение → виджет → подтверждение на бэкенде.
    pub async fn submit(&mut self, credentials: Option<&Credentials>) -> &BookingState {
        let BookingState::SeatSelection { event, seats, .. } = &self.state else {
            return &self.state;
        };
        let (event, seats) = (event.clone(), *seats);

        let Some(credentials) = credentials else {
            self.state = BookingState::SeatSelection {
                event,
                seats,
                prompt: Some(LOGIN_PROMPT.to_string()),
            };
            return &self.state;
        };
        if event.is_sold_out() {
            self.state = BookingState::SeatSelection {
                event,
                seats,
                prompt: Some(SOLD_OUT_PROMPT.to_string()),
            };
            return &self.state;
        }

        self.state = BookingState::PaymentPending { event: event.clone(), seats, booking_id: None };
        self.state = match self.pay(credentials, &event, seats).await {
            Ok(booking) => {
                info!("Booking {} confirmed for event {}", booking.id, event.id);
                BookingState::Confirmed { booking }
            }
            Err(e) => {
                warn!("Booking for event {} failed: {}", event.id, e);
                BookingState::Failed { event, seats, message: e.user_message() }
            }
        };
        &self.state
    }

    async fn pay(&mut self, credentials: &Credentials, event: &Event, seats: u32) -> Result<Booking> {
        let intent = self
            .api
            .create_payment_intent(credentials, &BookingRequest { event_id: event.id, seats })
            .await?;
        if let BookingState::PaymentPending { booking_id, .. } = &mut self.state {
            *booking_id = Some(intent.booking_id);
        }

        self.widget.confirm(&intent.client_secret).await?;

        let confirmation = self.api.confirm_payment(credentials, intent.booking_id).await?;
        match (confirmation.status, confirmation.booking) {
            (ConfirmationStatus::Success, Some(booking)) => Ok(booking),
            (ConfirmationStatus::Success, None) => Err(ClientError::Payment(
                "Payment succeeded but the booking was not returned".to_string(),
            )),
            (ConfirmationStatus::Pending, _) => Err(ClientError::Payment(
                "Payment is still being processed, please check your bookings shortly".to_string(),
            )),
        }
    }

    /// Failed → SeatSelection, сообщение ошибки остаётся подсказкой.
    pub fn retry(&mut self) -> Result<()> {
        let BookingState::Failed { event, seats, message } = &self.state else {
            return Err(ClientError::InvalidState("nothing to retry"));
        };
        self.state = BookingState::SeatSelection {
            event: event.clone(),
            seats: *seats,
            prompt: Some(message.clone()),
        };
        Ok(())
    }

    /// Назад к списку. Во время оплаты отменить нельзя.
    pub fn cancel(&mut self) -> Result<()> {
        if matches!(self.state, BookingState::PaymentPending { .. }) {
            return Err(ClientError::InvalidState("payment is in progress"));
        }
        self.leave_room();
        self.state = BookingState::Browsing;
        Ok(())
    }
}

impl Drop for BookingFlow {
    fn drop(&mut self) {
        self.leave_room();
    }
}
