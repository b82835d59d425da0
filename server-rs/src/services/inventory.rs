use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{InventoryMovement, MovementKind};

/// Stock level after applying a movement, and the quantity to record.
/// `Adjust` sets an absolute level and records the signed difference.
pub fn apply_movement(kind: MovementKind, stock: i32, quantity: i32) -> AppResult<(i32, i32)> {
    match kind {
        MovementKind::Adjust => {
            if quantity < 0 {
                return Err(AppError::BadRequest("Stock level cannot be negative".into()));
            }
            Ok((quantity, quantity - stock))
        }
        MovementKind::In => {
            if quantity <= 0 {
                return Err(AppError::BadRequest("Quantity must be positive".into()));
            }
            let after = stock
                .checked_add(quantity)
                .ok_or_else(|| AppError::BadRequest("Stock level out of range".into()))?;
            Ok((after, quantity))
        }
        MovementKind::Out | MovementKind::Sale => {
            if quantity <= 0 {
                return Err(AppError::BadRequest("Quantity must be positive".into()));
            }
            if stock < quantity {
                return Err(AppError::InsufficientStock {
                    available: stock,
                    requested: quantity,
                });
            }
            Ok((stock - quantity, quantity))
        }
    }
}

async fn lock_stock(conn: &mut PgConnection, property_id: Uuid, product_id: Uuid) -> AppResult<i32> {
    sqlx::query_scalar(
        "SELECT stock_on_hand FROM products WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(product_id)
    .bind(property_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

#[allow(clippy::too_many_arguments)]
async fn write_movement(
    conn: &mut PgConnection,
    property_id: Uuid,
    product_id: Uuid,
    kind: MovementKind,
    recorded: i32,
    before: i32,
    after: i32,
    reference: Option<&str>,
    notes: Option<&str>,
) -> AppResult<InventoryMovement> {
    sqlx::query("UPDATE products SET stock_on_hand = $2 WHERE id = $1")
        .bind(product_id)
        .bind(after)
        .execute(&mut *conn)
        .await?;

    let movement = sqlx::query_as::<_, InventoryMovement>(
        r#"INSERT INTO inventory_movements
            (id, property_id, product_id, kind, quantity, stock_before, stock_after, reference, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(property_id)
    .bind(product_id)
    .bind(kind.as_str())
    .bind(recorded)
    .bind(before)
    .bind(after)
    .bind(reference)
    .bind(notes)
    .fetch_one(&mut *conn)
    .await?;

    Ok(movement)
}

/// Records a stock movement inside the caller's transaction.
pub async fn record_movement(
    conn: &mut PgConnection,
    property_id: Uuid,
    product_id: Uuid,
    kind: MovementKind,
    quantity: i32,
    reference: Option<&str>,
    notes: Option<&str>,
) -> AppResult<InventoryMovement> {
    let before = lock_stock(conn, property_id, product_id).await?;
    let (after, recorded) = apply_movement(kind, before, quantity)?;
    write_movement(conn, property_id, product_id, kind, recorded, before, after, reference, notes).await
}

/// Takes stock for a product charged to a room. A shortage does not block the
/// charge: the sale is posted and the stock is left for someone to correct.
pub async fn sell_for_charge(
    conn: &mut PgConnection,
    property_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    reference: &str,
) -> AppResult<Option<InventoryMovement>> {
    let before = lock_stock(conn, property_id, product_id).await?;
    match apply_movement(MovementKind::Sale, before, quantity) {
        Ok((after, recorded)) => {
            let movement = write_movement(
                conn,
                property_id,
                product_id,
                MovementKind::Sale,
                recorded,
                before,
                after,
                Some(reference),
                None,
            )
            .await?;
            Ok(Some(movement))
        }
        Err(AppError::InsufficientStock { available, requested }) => {
            tracing::warn!(
                %product_id,
                available,
                requested,
                "charged product without enough stock; stock left unchanged"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Receives purchased units and moves the product's cost price to the
/// latest unit cost.
pub async fn receive_purchase_line(
    conn: &mut PgConnection,
    property_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_cost: Decimal,
    reference: &str,
) -> AppResult<InventoryMovement> {
    let movement = record_movement(
        conn,
        property_id,
        product_id,
        MovementKind::In,
        quantity,
        Some(reference),
        None,
    )
    .await?;

    sqlx::query("UPDATE products SET cost_price = $2 WHERE id = $1")
        .bind(product_id)
        .bind(unit_cost)
        .execute(&mut *conn)
        .await?;

    Ok(movement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_stock_adds_up() {
        assert_eq!(apply_movement(MovementKind::In, 4, 6).unwrap(), (10, 6));
    }

    #[test]
    fn sale_cannot_overdraw() {
        assert_eq!(apply_movement(MovementKind::Sale, 5, 5).unwrap(), (0, 5));
        match apply_movement(MovementKind::Out, 2, 5) {
            Err(AppError::InsufficientStock { available, requested }) => {
                assert_eq!((available, requested), (2, 5));
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[test]
    fn adjustment_sets_absolute_level() {
        assert_eq!(apply_movement(MovementKind::Adjust, 12, 9).unwrap(), (9, -3));
        assert_eq!(apply_movement(MovementKind::Adjust, 0, 0).unwrap(), (0, 0));
        assert!(apply_movement(MovementKind::Adjust, 3, -1).is_err());
    }

    #[test]
    fn zero_quantity_movements_are_rejected() {
        assert!(apply_movement(MovementKind::In, 1, 0).is_err());
        assert!(apply_movement(MovementKind::Sale, 1, 0).is_err());
    }

    #[test]
    fn receipts_past_the_stock_ceiling_are_rejected() {
        assert!(matches!(
            apply_movement(MovementKind::In, i32::MAX - 1, 2),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(apply_movement(MovementKind::In, i32::MAX - 2, 2).unwrap(), (i32::MAX, 2));
    }
}
