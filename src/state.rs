use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::{ServiceCatalog, ShopRules};
use crate::services::availability::AvailabilityEngine;
use crate::services::booking::BookingReconciler;
use crate::services::calendar::CalendarProvider;
use crate::services::clock::Clock;
use crate::services::lock::SlotLock;
use crate::services::mailer::Mailer;
use crate::services::notify::{Notifier, ShopContact};
use crate::store::{SheetStore, SlotSheet};

pub struct AppState {
    pub config: AppConfig,
    pub availability: AvailabilityEngine,
    pub bookings: BookingReconciler,
}

/// Outside collaborators the services are built over.
pub struct Upstreams {
    pub store: Arc<dyn SheetStore>,
    pub clock: Arc<dyn Clock>,
    pub lock: Arc<dyn SlotLock>,
    pub calendar: Option<Arc<dyn CalendarProvider>>,
    pub mailer: Option<Arc<dyn Mailer>>,
}

impl AppState {
    pub fn build(config: AppConfig, upstreams: Upstreams) -> anyhow::Result<Self> {
        let rules = Arc::new(ShopRules::from_config(&config)?);
        let timeout = Duration::from_secs(config.upstream_timeout_secs);

        let slots = SlotSheet::new(
            upstreams.store,
            config.slots_sheet.clone(),
            config.bookings_sheet.clone(),
            timeout,
        );
        let notifier = Notifier::new(
            upstreams.calendar,
            upstreams.mailer,
            ServiceCatalog::default(),
            ShopContact {
                name: config.shop_name.clone(),
                email: config.shop_email.clone(),
                time_zone: config.shop_timezone.clone(),
            },
            timeout,
        )?;

        Ok(Self {
            availability: AvailabilityEngine::new(slots.clone(), rules.clone(), upstreams.clock.clone()),
            bookings: BookingReconciler::new(
                slots,
                rules,
                upstreams.clock,
                upstreams.lock,
                Arc::new(notifier),
            ),
            config,
        })
    }
}
