//! PostgreSQL implementation of BookingRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::booking::{Booking, BookingFilter, BookingStatus, NewBooking, ServiceType};
use crate::domain::foundation::{BookingId, DomainError, Timestamp, UserId};
use crate::ports::BookingRepository;

const BOOKING_COLUMNS: &str =
    "id, user_id, provider_id, service_type, start_time, end_time, status, created_at, updated_at";

/// PostgreSQL implementation of BookingRepository.
#[derive(Clone)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn create(&self, booking: NewBooking) -> Result<Booking, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO bookings (user_id, provider_id, service_type, start_time, end_time, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(booking.user_id.as_i64())
            .bind(booking.provider_id.as_i64())
            .bind(booking.service_type.as_str())
            .bind(booking.start_time.as_datetime())
            .bind(booking.end_time.as_datetime())
            .bind(booking.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to insert booking: {}", e)))?;

        row_to_booking(&row)
    }

    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>, DomainError> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch booking: {}", e)))?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Booking>, u64), DomainError> {
        // Unset filters bind NULL and match every row.
        const WHERE_CLAUSE: &str = r#"
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::BIGINT IS NULL OR provider_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR start_time > $3)
              AND ($4::TIMESTAMPTZ IS NULL OR start_time < $4)
        "#;

        let user_id = filter.user_id.map(|id| id.as_i64());
        let provider_id = filter.provider_id.map(|id| id.as_i64());
        let starts_after: Option<DateTime<Utc>> = filter.starts_after.map(|t| *t.as_datetime());
        let starts_before: Option<DateTime<Utc>> = filter.starts_before.map(|t| *t.as_datetime());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bookings {}", WHERE_CLAUSE))
            .bind(user_id)
            .bind(provider_id)
            .bind(starts_after)
            .bind(starts_before)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to count bookings: {}", e)))?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let sql = format!(
            "SELECT {} FROM bookings {} ORDER BY start_time ASC, id ASC LIMIT $5 OFFSET $6",
            BOOKING_COLUMNS, WHERE_CLAUSE
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(provider_id)
            .bind(starts_after)
            .bind(starts_before)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to list bookings: {}", e)))?;

        let bookings = rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()?;
        Ok((bookings, u64::try_from(total).unwrap_or(0)))
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(format!("Failed to get {}: {}", name, e)))
}

fn row_to_booking(row: &PgRow) -> Result<Booking, DomainError> {
    let service_type: String = column(row, "service_type")?;
    let status: String = column(row, "status")?;

    Ok(Booking {
        id: BookingId::from_raw(column(row, "id")?),
        user_id: UserId::from_raw(column(row, "user_id")?),
        provider_id: UserId::from_raw(column(row, "provider_id")?),
        service_type: service_type
            .parse::<ServiceType>()
            .map_err(|e| DomainError::database(e.to_string()))?,
        start_time: Timestamp::from_datetime(column(row, "start_time")?),
        end_time: Timestamp::from_datetime(column(row, "end_time")?),
        status: status
            .parse::<BookingStatus>()
            .map_err(|e| DomainError::database(e.to_string()))?,
        created_at: Timestamp::from_datetime(column(row, "created_at")?),
        updated_at: Timestamp::from_datetime(column(row, "updated_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
        pool
    }

    fn new_booking(user: i64, provider: i64, start: Timestamp) -> NewBooking {
        NewBooking {
            user_id: UserId::from_raw(user),
            provider_id: UserId::from_raw(provider),
            service_type: ServiceType::Consultation,
            start_time: start,
            end_time: start.plus_minutes(30),
            status: BookingStatus::Confirmed,
        }
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn create_then_find_returns_same_booking() {
        let repo = PostgresBookingRepository::new(test_pool().await);
        let start = Timestamp::now().plus_minutes(120);

        let created = repo.create(new_booking(1, 2, start)).await.unwrap();
        let found = repo.find_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.provider_id, UserId::from_raw(2));
        assert_eq!(found.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn list_filters_by_provider_and_window() {
        let repo = PostgresBookingRepository::new(test_pool().await);
        let now = Timestamp::now();
        let provider = 900_000 + (now.as_unix_millis() % 100_000);

        repo.create(new_booking(1, provider, now.plus_minutes(60))).await.unwrap();
        repo.create(new_booking(1, provider, now.plus_minutes(30))).await.unwrap();

        let filter = BookingFilter {
            provider_id: Some(UserId::from_raw(provider)),
            starts_after: Some(now),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, 1, 10).await.unwrap();

        assert_eq!(total, 2);
        assert!(items[0].start_time.is_before(&items[1].start_time));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn missing_booking_is_none() {
        let repo = PostgresBookingRepository::new(test_pool().await);
        assert!(repo.find_by_id(BookingId::from_raw(i64::MAX)).await.unwrap().is_none());
    }
}
