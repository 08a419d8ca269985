pub mod availability;
pub mod booking;
pub mod calendar;
pub mod clock;
pub mod google_auth;
pub mod lock;
pub mod mailer;
pub mod notify;
