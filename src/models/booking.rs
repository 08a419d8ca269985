use serde::{Deserialize, Serialize};

use crate::models::slot::{SlotDate, SlotKey, SlotTime};

/// Booking form body as submitted by the client. Every field is optional at
/// the wire level so a missing field becomes a validation failure, not a
/// deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub barber: String,
    pub service: String,
    pub date: String,
    pub time: String,
}

/// A booking whose fields passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub barber: String,
    pub service: String,
    pub date: SlotDate,
    pub time: SlotTime,
}

impl Booking {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.date, self.time, &self.barber)
    }

    /// `(XXX) XXX-XXXX` for ten-digit numbers, otherwise as entered.
    pub fn formatted_phone(&self) -> Option<String> {
        let phone = self.phone.as_deref()?;
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() == 10 {
            Some(format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]))
        } else {
            Some(phone.to_string())
        }
    }
}

/// What a customer gets back after a successful reservation. The flags are
/// informational; none of them being false undoes the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookingConfirmation {
    pub email_sent: bool,
    pub sheet_updated: bool,
    pub calendar_updated: bool,
}
