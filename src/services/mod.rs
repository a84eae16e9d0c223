pub mod booking_flow;
pub mod payment;
