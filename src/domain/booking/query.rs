//! Query-side types for listing bookings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

use super::booking::{Booking, BookingView};

/// Which side of "now" a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Upcoming,
    Past,
}

impl FromStr for TimeWindow {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(TimeWindow::Upcoming),
            "past" => Ok(TimeWindow::Past),
            other => Err(ValidationError::invalid_format(
                "type",
                format!("expected 'upcoming' or 'past', got '{}'", other),
            )),
        }
    }
}

/// Storage-level filter. Every `Some` field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub user_id: Option<UserId>,
    pub provider_id: Option<UserId>,
    /// Exclusive lower bound on `start_time`.
    pub starts_after: Option<Timestamp>,
    /// Exclusive upper bound on `start_time`.
    pub starts_before: Option<Timestamp>,
}

impl BookingFilter {
    /// Restricts the filter to one side of `now`.
    pub fn within(mut self, window: TimeWindow, now: Timestamp) -> Self {
        match window {
            TimeWindow::Upcoming => self.starts_after = Some(now),
            TimeWindow::Past => self.starts_before = Some(now),
        }
        self
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.user_id.map_or(true, |id| booking.user_id == id)
            && self.provider_id.map_or(true, |id| booking.provider_id == id)
            && self
                .starts_after
                .map_or(true, |t| booking.start_time.is_after(&t))
            && self
                .starts_before
                .map_or(true, |t| booking.start_time.is_before(&t))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        Self {
            total,
            page,
            limit,
            total_pages: (total + limit_u64 - 1) / limit_u64,
        }
    }
}

/// One page of bookings as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingPage {
    pub data: Vec<BookingView>,
    pub meta: PageMeta,
}
