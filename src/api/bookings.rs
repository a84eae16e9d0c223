use super::{ApiClient, Authorized, Credentials};
use crate::error::{ClientError, Result};
use crate::models::{Booking, BookingRequest, PaymentConfirmation, PaymentIntent};

fn check_seats(request: &BookingRequest) -> Result<()> {
    if request.seats == 0 {
        return Err(ClientError::Validation("at least one seat is required".to_string()));
    }
    Ok(())
}

impl ApiClient {
    /// GET /my-bookings
    pub async fn my_bookings(&self, credentials: &Credentials) -> Result<Vec<Booking>> {
        self.send(self.get("/my-bookings")?.authorized(credentials)).await
    }

    /// POST /bookings: бронь без оплаты.
    pub async fn create_booking(
        &self,
        credentials: &Credentials,
        request: &BookingRequest,
    ) -> Result<Booking> {
        check_seats(request)?;
        self.send(self.post("/bookings")?.authorized(credentials).json(request))
            .await
    }

    /// POST /create-payment-intent: создаёт бронь в статусе pending и платёжное намерение.
    pub async fn create_payment_intent(
        &self,
        credentials: &Credentials,
        request: &BookingRequest,
    ) -> Result<PaymentIntent> {
        check_seats(request)?;
        self.send(
            self.post("/create-payment-intent")?
                .authorized(credentials)
                .json(request),
        )
        .await
    }

    /// POST /confirm-payment/{booking_id}
    pub async fn confirm_payment(
        &self,
        credentials: &Credentials,
        booking_id: i64,
    ) -> Result<PaymentConfirmation> {
        self.send(
            self.post(&format!("/confirm-payment/{}", booking_id))?
                .authorized(credentials),
        )
        .await
    }

    /// GET /bookings/{id}/ticket: PNG с QR-кодом оплаченного билета.
    #[cfg(feature = "tickets")]
    pub async fn ticket_qr(&self, credentials: &Credentials, booking_id: i64) -> Result<Vec<u8>> {
        let request = self
            .get(&format!("/bookings/{}/ticket", booking_id))?
            .authorized(credentials);
        let response = Self::checked(request).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
