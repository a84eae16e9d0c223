//! Экраны клиента. Каждый держит свой снимок серверных данных.

pub mod bookings;
#[cfg(feature = "admin")]
pub mod dashboard;
pub mod events;
pub mod notifications;

pub use bookings::BookingsView;
#[cfg(feature = "admin")]
pub use dashboard::{DashboardView, OccupancyBar};
pub use events::{EventsSnapshot, EventsView};
pub use notifications::{Notification, NotificationCategory, NotificationCenter, NotificationsView};
