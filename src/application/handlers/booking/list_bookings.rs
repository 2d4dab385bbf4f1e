//! ListBookingsHandler - Query handler for paged booking listings.

use std::sync::Arc;

use crate::domain::booking::{BookingError, BookingFilter, BookingPage, PageMeta, TimeWindow};
use crate::domain::foundation::{Identity, Role};
use crate::ports::{BookingRepository, Clock};

/// Query for one page of bookings on one side of "now".
#[derive(Debug, Clone)]
pub struct ListBookingsQuery {
    pub window: TimeWindow,
    pub page: u32,
    pub limit: u32,
}

/// Handler for listing bookings visible to the caller.
///
/// Users list their own bookings and providers the bookings made with them;
/// a caller holding both is scoped as a user. Admins without either role
/// list everything. Results are ordered by start time ascending.
pub struct ListBookingsHandler {
    repository: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
}

impl ListBookingsHandler {
    pub fn new(repository: Arc<dyn BookingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn handle(
        &self,
        query: ListBookingsQuery,
        caller: &Identity,
    ) -> Result<BookingPage, BookingError> {
        if query.page == 0 || query.limit == 0 {
            return Err(BookingError::InvalidPagination);
        }

        let filter = scope_for(caller).within(query.window, self.clock.now());

        let (bookings, total) = self
            .repository
            .list(&filter, query.page, query.limit)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %caller.subject, error = %e, "Failed to list bookings");
                BookingError::from(e)
            })?;

        Ok(BookingPage {
            data: bookings.iter().map(|b| b.view()).collect(),
            meta: PageMeta::new(total, query.page, query.limit),
        })
    }
}

fn scope_for(caller: &Identity) -> BookingFilter {
    let mut filter = BookingFilter::default();
    // The user role wins over provider; admin scope only applies when
    // neither is held.
    if caller.has_role(Role::User) {
        filter.user_id = Some(caller.subject);
    } else if caller.has_role(Role::Provider) {
        filter.provider_id = Some(caller.subject);
    } else if !caller.is_admin() {
        filter.user_id = Some(caller.subject);
    }
    filter
}
