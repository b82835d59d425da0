use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    let url = config.database_url();
    PgPoolOptions::new()
        .min_connections(config.db.pool_min)
        .max_connections(config.db.pool_max)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Allocates the next number in a per-property, per-year document series
/// (`RES-2025-0001`, `PAY-2025-00001`). Runs inside the caller's transaction.
pub async fn next_document_number(
    conn: &mut sqlx::PgConnection,
    property_id: uuid::Uuid,
    prefix: &str,
    year: i32,
    width: usize,
) -> Result<String, sqlx::Error> {
    let value: i32 = sqlx::query_scalar(
        r#"INSERT INTO document_counters (property_id, prefix, year, value)
        VALUES ($1, $2, $3, 1)
        ON CONFLICT (property_id, prefix, year) DO UPDATE SET value = document_counters.value + 1
        RETURNING value"#,
    )
    .bind(property_id)
    .bind(prefix)
    .bind(year)
    .fetch_one(conn)
    .await?;

    Ok(format_document_number(prefix, year, value, width))
}

pub fn format_document_number(prefix: &str, year: i32, value: i32, width: usize) -> String {
    format!("{prefix}-{year}-{value:0width$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_numbers_are_zero_padded() {
        assert_eq!(format_document_number("RES", 2025, 7, 4), "RES-2025-0007");
        assert_eq!(format_document_number("PAY", 2025, 123, 5), "PAY-2025-00123");
        assert_eq!(format_document_number("RES", 2025, 12345, 4), "RES-2025-12345");
    }
}
