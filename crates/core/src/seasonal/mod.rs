//! Seasonal sale registry and buy-now-or-wait decisions.
//!
//! Two decision contracts are exposed side by side:
//! - [`SeasonalOptimizer::should_wait_for_sale`] returns a bare boolean.
//! - [`SeasonalOptimizer::sale_advice`] returns a [`SaleAdvice`] naming the sale to wait for.

mod calendar;

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::product::ProductRecord;
use crate::errors::ApplicationError;

pub use calendar::SeasonalCalendar;

/// An upcoming sale must beat this discount for waiting to be worthwhile.
pub const WAIT_DISCOUNT_THRESHOLD_PCT: u8 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalEvent {
    Christmas,
    BlackFriday,
    CyberMonday,
    PrimeDay,
    BackToSchool,
}

impl SeasonalEvent {
    pub const ALL: [SeasonalEvent; 5] = [
        Self::Christmas,
        Self::BlackFriday,
        Self::CyberMonday,
        Self::PrimeDay,
        Self::BackToSchool,
    ];

    pub fn discount_pct(self) -> u8 {
        match self {
            Self::Christmas => 10,
            Self::BlackFriday => 40,
            Self::CyberMonday => 30,
            Self::PrimeDay => 25,
            Self::BackToSchool => 15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Christmas => "christmas",
            Self::BlackFriday => "black_friday",
            Self::CyberMonday => "cyber_monday",
            Self::PrimeDay => "prime_day",
            Self::BackToSchool => "back_to_school",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Christmas => "Christmas",
            Self::BlackFriday => "Black Friday",
            Self::CyberMonday => "Cyber Monday",
            Self::PrimeDay => "Prime Day",
            Self::BackToSchool => "Back to School",
        }
    }
}

impl std::fmt::Display for SeasonalEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SeasonalEvent {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|event| event.as_str() == normalized).ok_or_else(|| {
            ApplicationError::InvalidInput(format!(
                "unknown seasonal event `{value}` \
                (expected christmas|black_friday|cyber_monday|prime_day|back_to_school)"
            ))
        })
    }
}

/// Sale window. Callers are expected to pass `start_date < end_date`; it is not checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UpcomingSale {
    pub event: SeasonalEvent,
    pub discount_pct: u8,
    pub window: EventWindow,
}

impl UpcomingSale {
    pub fn describe(&self) -> String {
        format!(
            "{}: {}% discount (From {} to {})",
            self.event.label(),
            self.discount_pct,
            self.window.start_date.format("%d-%m-%Y"),
            self.window.end_date.format("%d-%m-%Y"),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaleAdvice {
    pub should_wait: bool,
    pub sale_event: Option<SeasonalEvent>,
    pub estimated_sale_date: Option<DateTime<Utc>>,
    pub expected_discount: Option<u8>,
    pub current_price: Option<Decimal>,
    pub estimated_sale_price: Option<Decimal>,
}

#[derive(Clone, Debug, Default)]
pub struct SeasonalOptimizer {
    events: BTreeMap<SeasonalEvent, EventWindow>,
}

impl SeasonalOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering an event again replaces its previous window.
    pub fn register_event(
        &mut self,
        event: SeasonalEvent,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) {
        self.events.insert(event, EventWindow { start_date, end_date });
    }

    /// Registers the standard windows of `year`. Sales of that year which have
    /// already started are never upcoming, so late in the year nothing is worth waiting for.
    pub fn register_standard_year(&mut self, year: i32) {
        for (event, window) in SeasonalCalendar::standard(year) {
            self.register_event(event, window.start_date, window.end_date);
        }
    }

    pub fn window(&self, event: SeasonalEvent) -> Option<&EventWindow> {
        self.events.get(&event)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Windows starting strictly after `now`; in-progress and past sales are excluded.
    pub fn upcoming_events_at(&self, now: DateTime<Utc>) -> Vec<UpcomingSale> {
        self.events
            .iter()
            .filter(|(_, window)| window.start_date > now)
            .map(|(event, window)| UpcomingSale {
                event: *event,
                discount_pct: event.discount_pct(),
                window: *window,
            })
            .collect()
    }

    /// `product_id` and `current_price` do not influence the decision.
    pub fn should_wait_for_sale(&self, product_id: &str, current_price: Decimal) -> bool {
        self.should_wait_for_sale_at(product_id, current_price, Utc::now())
    }

    pub fn should_wait_for_sale_at(
        &self,
        product_id: &str,
        current_price: Decimal,
        now: DateTime<Utc>,
    ) -> bool {
        let upcoming = self.upcoming_events_at(now);
        if upcoming.is_empty() {
            return false;
        }

        for sale in &upcoming {
            info!(
                event_name = "seasonal.upcoming_event",
                product_id,
                current_price = %current_price,
                sale_event = sale.event.as_str(),
                discount_pct = sale.discount_pct,
                "{}",
                sale.describe()
            );
        }

        upcoming.iter().any(|sale| sale.discount_pct > WAIT_DISCOUNT_THRESHOLD_PCT)
    }

    pub fn sale_advice(&self, product: &ProductRecord) -> SaleAdvice {
        self.sale_advice_at(product, Utc::now())
    }

    /// Picks the deepest upcoming discount above the threshold; ties go to the
    /// earliest start.
    pub fn sale_advice_at(&self, product: &ProductRecord, now: DateTime<Utc>) -> SaleAdvice {
        let current_price = product.price_amount();
        let best = self
            .upcoming_events_at(now)
            .into_iter()
            .filter(|sale| sale.discount_pct > WAIT_DISCOUNT_THRESHOLD_PCT)
            .min_by(|left, right| {
                right
                    .discount_pct
                    .cmp(&left.discount_pct)
                    .then(left.window.start_date.cmp(&right.window.start_date))
                    .then(left.event.cmp(&right.event))
            });

        let Some(sale) = best else {
            return SaleAdvice {
                should_wait: false,
                sale_event: None,
                estimated_sale_date: None,
                expected_discount: None,
                current_price,
                estimated_sale_price: None,
            };
        };

        info!(
            event_name = "seasonal.sale_advice",
            product_id = product.id.as_deref().unwrap_or("unknown"),
            sale_event = sale.event.as_str(),
            "{}",
            sale.describe()
        );

        SaleAdvice {
            should_wait: true,
            sale_event: Some(sale.event),
            estimated_sale_date: Some(sale.window.start_date),
            expected_discount: Some(sale.discount_pct),
            current_price,
            estimated_sale_price: current_price
                .map(|price| discounted_price(price, sale.discount_pct)),
        }
    }
}

fn discounted_price(price: Decimal, discount_pct: u8) -> Decimal {
    let factor = Decimal::from(100u8 - discount_pct.min(100)) / Decimal::from(100u8);
    (price * factor).round_dp(2)
}
