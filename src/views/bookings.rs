use tracing::error;

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{Booking, BookingStatus};
use crate::session::SessionManager;

/// Экран «Мои бронирования». Без подписок: обновляется только загрузкой.
pub struct BookingsView {
    api: ApiClient,
    bookings: Vec<Booking>,
}

impl BookingsView {
    pub fn new(api: ApiClient) -> Self {
        Self { api, bookings: Vec::new() }
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn paid(&self) -> impl Iterator<Item = &Booking> {
        self.bookings
            .iter()
            .filter(|booking| booking.status == BookingStatus::Paid)
    }

    /// Загружает брони текущего пользователя. 401 от бэкенда завершает сессию.
    pub async fn refresh(&mut self, session: &SessionManager) -> Result<&[Booking]> {
        let credentials = session.require_credentials()?;
        match self.api.my_bookings(&credentials).await {
            Ok(bookings) => {
                self.bookings = bookings;
                Ok(&self.bookings)
            }
            Err(e) => {
                error!("Failed to load bookings: {}", e);
                session.handle_error(&e).await;
                Err(e)
            }
        }
    }
}
