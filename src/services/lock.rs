use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::models::SlotKey;

/// Held for the duration of a reservation; dropping it releases the slot.
pub type SlotLease = Box<dyn Any + Send>;

/// Serializes the read-check-write of a reservation per slot.
#[async_trait]
pub trait SlotLock: Send + Sync {
    async fn acquire(&self, key: &SlotKey) -> anyhow::Result<SlotLease>;
}

/// Per-slot mutex scoped to this process. Only correct while a single
/// instance serves every booking.
#[derive(Default)]
pub struct InMemorySlotLock {
    slots: Mutex<HashMap<SlotKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl InMemorySlotLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotLock for InMemorySlotLock {
    async fn acquire(&self, key: &SlotKey) -> anyhow::Result<SlotLease> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| anyhow::anyhow!("slot lock table poisoned"))?;
            // Entries nobody holds or waits on can go.
            slots.retain(|_, m| Arc::strong_count(m) > 1);
            slots.entry(key.clone()).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        Ok(Box::new(guard))
    }
}

/// No mutual exclusion. Two concurrent bookings for the same slot can both
/// pass the availability check before either writes `Booked`; use only when
/// the backing store or deployment serializes bookings some other way.
pub struct NoopSlotLock;

#[async_trait]
impl SlotLock for NoopSlotLock {
    async fn acquire(&self, _key: &SlotKey) -> anyhow::Result<SlotLease> {
        Ok(Box::new(()))
    }
}
