use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Creation and retirement stamps shared by every soft-deletable entity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeletable {
    RoomTypes,
    Rooms,
    Clients,
    Products,
    ProductCategories,
    Suppliers,
}

impl SoftDeletable {
    pub fn table(self) -> &'static str {
        match self {
            SoftDeletable::RoomTypes => "room_types",
            SoftDeletable::Rooms => "rooms",
            SoftDeletable::Clients => "clients",
            SoftDeletable::Products => "products",
            SoftDeletable::ProductCategories => "product_categories",
            SoftDeletable::Suppliers => "suppliers",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SoftDeletable::RoomTypes => "Room type",
            SoftDeletable::Rooms => "Room",
            SoftDeletable::Clients => "Client",
            SoftDeletable::Products => "Product",
            SoftDeletable::ProductCategories => "Category",
            SoftDeletable::Suppliers => "Supplier",
        }
    }
}

/// Predicate selecting live rows of `alias`.
pub fn live(alias: &str) -> String {
    if alias.is_empty() {
        "deleted_at IS NULL".to_string()
    } else {
        format!("{alias}.deleted_at IS NULL")
    }
}

/// Retires a row in the caller's property. Missing or already-retired rows are a 404.
pub async fn soft_delete(
    db: &sqlx::PgPool,
    entity: SoftDeletable,
    property_id: Uuid,
    id: Uuid,
) -> AppResult<()> {
    let sql = format!(
        "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND property_id = $2 AND {}",
        entity.table(),
        live("")
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(property_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{} not found", entity.label())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_predicate_respects_alias() {
        assert_eq!(live(""), "deleted_at IS NULL");
        assert_eq!(live("r"), "r.deleted_at IS NULL");
    }

    #[test]
    fn retired_lifecycle_is_not_live() {
        let lifecycle = Lifecycle {
            created_at: Utc::now(),
            deleted_at: Some(Utc::now()),
        };
        assert!(!lifecycle.is_live());
    }
}
