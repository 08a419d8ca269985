pub mod availability;
pub mod booking;
pub mod service;
pub mod slot;

pub use availability::ShopRules;
pub use booking::{Booking, BookingConfirmation, BookingRequest};
pub use service::{ServiceCatalog, ServiceRule, ServiceSpec};
pub use slot::{SlotDate, SlotKey, SlotRow, SlotTime};
