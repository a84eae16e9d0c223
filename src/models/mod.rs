pub mod booking;
pub mod event;
pub mod stats;
pub mod user;

pub use booking::{
    Booking, BookingRequest, BookingStatus, ConfirmationStatus, PaymentConfirmation,
    PaymentIntent,
};
pub use event::{Event, EventsQuery, NewEvent};
pub use stats::{AdminStats, OccupancyPoint};
pub use user::{Registration, TokenResponse, User};
