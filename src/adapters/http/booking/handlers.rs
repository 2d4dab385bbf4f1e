//! HTTP handlers for booking endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::booking::{
    CreateBookingCommand, CreateBookingHandler, GetBookingHandler, ListBookingsHandler,
    ListBookingsQuery,
};
use crate::domain::booking::{BookingError, TimeWindow};
use crate::domain::foundation::{Role, Timestamp, UserId};

use super::dto::{CreateBookingRequest, ErrorResponse, ListBookingsParams};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct BookingHandlers {
    create_handler: Arc<CreateBookingHandler>,
    get_handler: Arc<GetBookingHandler>,
    list_handler: Arc<ListBookingsHandler>,
}

impl BookingHandlers {
    pub fn new(
        create_handler: Arc<CreateBookingHandler>,
        get_handler: Arc<GetBookingHandler>,
        list_handler: Arc<ListBookingsHandler>,
    ) -> Self {
        Self {
            create_handler,
            get_handler,
            list_handler,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/bookings - Create a booking for the calling user
pub async fn create_booking(
    State(handlers): State<BookingHandlers>,
    RequireAuth(caller): RequireAuth,
    Json(req): Json<CreateBookingRequest>,
) -> Response {
    if !caller.has_role(Role::User) {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden("Insufficient permissions")),
        )
            .into_response();
    }

    let provider_id = match UserId::new(req.provider_id) {
        Ok(id) => id,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(e.to_string())))
                .into_response()
        }
    };

    let cmd = CreateBookingCommand {
        provider_id,
        service_type: req.service_type,
        start_time: Timestamp::from_datetime(req.start_time),
        end_time: Timestamp::from_datetime(req.end_time),
    };

    match handlers.create_handler.handle(cmd, caller.subject).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => booking_error_response(e),
    }
}

/// GET /api/bookings/:id - Get one booking visible to the caller
pub async fn get_booking(
    State(handlers): State<BookingHandlers>,
    RequireAuth(caller): RequireAuth,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<i64>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Invalid booking id")),
        )
            .into_response();
    };

    match handlers.get_handler.handle(id, &caller).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => booking_error_response(e),
    }
}

/// GET /api/bookings?type=upcoming|past&page&limit - List bookings visible to the caller
pub async fn list_bookings(
    State(handlers): State<BookingHandlers>,
    RequireAuth(caller): RequireAuth,
    Query(params): Query<ListBookingsParams>,
) -> Response {
    let query = ListBookingsQuery {
        window: params.window.unwrap_or(TimeWindow::Past),
        page: params.page,
        limit: params.limit,
    };

    match handlers.list_handler.handle(query, &caller).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => booking_error_response(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn booking_error_response(error: BookingError) -> Response {
    let status = match &error {
        BookingError::InvalidTimeRange { .. }
        | BookingError::InvalidId(_)
        | BookingError::InvalidPagination => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::Forbidden => StatusCode::FORBIDDEN,
        BookingError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(ErrorResponse::from(&error))).into_response()
}
