use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Charge, LendRequest, LoanableItem, ReservationLoan, ReturnLoanRequest};
use crate::services::folio::{lock_reservation, write_folio, Folio};
use crate::services::pricing;

/// Units that came back and units still missing for a loan of `lent`.
/// An omitted count means everything came back.
pub fn settle_return(lent: i32, returned: Option<i32>) -> AppResult<(i32, i32)> {
    let returned = returned.unwrap_or(lent);
    if !(0..=lent).contains(&returned) {
        return Err(AppError::BadRequest(format!(
            "Returned quantity must be between 0 and {lent}"
        )));
    }
    Ok((returned, lent - returned))
}

/// Hands an item to a guest. A second loan of the same item while the first
/// is still out raises its quantity.
pub async fn lend(
    db: &PgPool,
    property_id: Uuid,
    reservation_id: Uuid,
    req: &LendRequest,
) -> AppResult<ReservationLoan> {
    let quantity = req.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }

    let mut tx = db.begin().await?;

    let reservation = lock_reservation(&mut tx, property_id, reservation_id).await?;
    let status = reservation.status()?;
    if status.is_terminal() {
        return Err(AppError::InvalidTransition {
            from: status.as_str().to_string(),
            action: "lend",
        });
    }

    let active: Option<bool> =
        sqlx::query_scalar("SELECT is_active FROM loanable_items WHERE id = $1 AND property_id = $2")
            .bind(req.item_id)
            .bind(property_id)
            .fetch_optional(&mut *tx)
            .await?;
    match active {
        None => return Err(AppError::NotFound("Loanable item not found".into())),
        Some(false) => return Err(AppError::BadRequest("Loanable item is inactive".into())),
        Some(true) => {}
    }

    let topped_up: Option<ReservationLoan> = sqlx::query_as(
        r#"UPDATE reservation_loans SET quantity = quantity + $3, notes = COALESCE($4, notes)
        WHERE reservation_id = $1 AND item_id = $2 AND returned_at IS NULL
        RETURNING *"#,
    )
    .bind(reservation_id)
    .bind(req.item_id)
    .bind(quantity)
    .bind(&req.notes)
    .fetch_optional(&mut *tx)
    .await?;

    let loan = match topped_up {
        Some(loan) => loan,
        None => {
            sqlx::query_as(
                r#"INSERT INTO reservation_loans (id, property_id, reservation_id, item_id, quantity, notes)
                VALUES ($1, $2, $3, $4, $5, $6) RETURNING *"#,
            )
            .bind(Uuid::new_v4())
            .bind(property_id)
            .bind(reservation_id)
            .bind(req.item_id)
            .bind(quantity)
            .bind(&req.notes)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    tx.commit().await?;

    tracing::info!(%property_id, reservation = %reservation.number, item_id = %req.item_id, quantity = loan.quantity, "item lent");
    Ok(loan)
}

/// Outcome of taking a loan back.
#[derive(Debug)]
pub struct LoanReturn {
    pub loan: ReservationLoan,
    pub missing: i32,
    /// Replacement charge posted for the missing units, if any.
    pub charge: Option<Charge>,
    pub balance_due: Option<Decimal>,
}

/// Closes a loan. Missing units are billed to the reservation at the item's
/// replacement cost unless the caller opts out or the item costs nothing.
pub async fn return_loan(
    db: &PgPool,
    property_id: Uuid,
    loan_id: Uuid,
    req: &ReturnLoanRequest,
    default_tax_rate: Decimal,
) -> AppResult<LoanReturn> {
    let mut tx = db.begin().await?;

    let reservation_id: Uuid =
        sqlx::query_scalar("SELECT reservation_id FROM reservation_loans WHERE id = $1 AND property_id = $2")
            .bind(loan_id)
            .bind(property_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Loan not found".into()))?;

    // Reservation first, then the loan, the same order lending takes.
    let reservation = lock_reservation(&mut tx, property_id, reservation_id).await?;
    let loan: ReservationLoan =
        sqlx::query_as("SELECT * FROM reservation_loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_one(&mut *tx)
            .await?;
    if loan.returned_at.is_some() {
        return Err(AppError::Conflict("Loan already returned".into()));
    }

    let (returned, missing) = settle_return(loan.quantity, req.quantity_returned)?;

    let item: LoanableItem = sqlx::query_as("SELECT * FROM loanable_items WHERE id = $1")
        .bind(loan.item_id)
        .fetch_one(&mut *tx)
        .await?;
    let unit_cost = req.unit_cost.unwrap_or(item.replacement_cost);
    if unit_cost < Decimal::ZERO {
        return Err(AppError::BadRequest("Unit cost cannot be negative".into()));
    }

    let bill = missing > 0 && unit_cost > Decimal::ZERO && req.charge_missing != Some(false);
    let (charge, balance_due) = if bill {
        let status = reservation.status()?;
        if !status.accepts_charges() {
            return Err(AppError::InvalidTransition {
                from: status.as_str().to_string(),
                action: "charge",
            });
        }

        let tax_rate: Decimal = sqlx::query_scalar("SELECT tax_rate FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(default_tax_rate);
        let amounts = pricing::price_line(missing, unit_cost, Some(tax_rate))?;

        let charge: Charge = sqlx::query_as(
            r#"INSERT INTO charges (id, property_id, reservation_id, description, quantity, unit_price,
                subtotal, tax, total, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(property_id)
        .bind(reservation.id)
        .bind(format!("Replacement: {}", item.name))
        .bind(missing)
        .bind(unit_cost)
        .bind(amounts.subtotal)
        .bind(amounts.tax)
        .bind(amounts.total)
        .bind(format!("Not returned: {missing} of {}", loan.quantity))
        .fetch_one(&mut *tx)
        .await?;

        let balance = write_folio(&mut tx, reservation.id, Folio::of(&reservation).post_charge(amounts.total)).await?;
        (Some(charge), Some(balance))
    } else {
        (None, None)
    };

    let loan: ReservationLoan = sqlx::query_as(
        r#"UPDATE reservation_loans
        SET quantity_returned = $2, charged_unit_cost = $3, charge_id = $4, returned_at = NOW()
        WHERE id = $1 RETURNING *"#,
    )
    .bind(loan_id)
    .bind(returned)
    .bind(charge.as_ref().map(|c| c.unit_price))
    .bind(charge.as_ref().map(|c| c.id))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if missing > 0 {
        tracing::warn!(%property_id, reservation = %reservation.number, item = %item.code, missing, charged = charge.is_some(), "loan returned short");
    } else {
        tracing::info!(%property_id, reservation = %reservation.number, item = %item.code, "loan returned");
    }

    Ok(LoanReturn {
        loan,
        missing,
        charge,
        balance_due,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_count_returns_everything() {
        assert_eq!(settle_return(3, None).unwrap(), (3, 0));
    }

    #[test]
    fn partial_returns_leave_units_missing() {
        assert_eq!(settle_return(3, Some(1)).unwrap(), (1, 2));
        assert_eq!(settle_return(2, Some(0)).unwrap(), (0, 2));
    }

    #[test]
    fn returning_more_than_lent_is_rejected() {
        assert!(matches!(settle_return(2, Some(3)), Err(AppError::BadRequest(_))));
        assert!(matches!(settle_return(2, Some(-1)), Err(AppError::BadRequest(_))));
    }

    mod store {
        use super::*;
        use crate::fixtures::{self, dec, seed_hotel, stay, Hotel};
        use crate::services::reservations;

        const TAX: Decimal = Decimal::from_parts(16, 0, 0, false, 2);

        async fn remote(db: &PgPool, hotel: &Hotel, cost: &str) -> Uuid {
            let id = Uuid::new_v4();
            sqlx::query(
                r#"INSERT INTO loanable_items (id, property_id, code, name, replacement_cost)
                VALUES ($1, $2, 'TV-REMOTE', 'TV remote', $3)"#,
            )
            .bind(id)
            .bind(hotel.property_id)
            .bind(dec(cost))
            .execute(db)
            .await
            .unwrap();
            id
        }

        fn lend_req(item_id: Uuid, quantity: i32) -> LendRequest {
            LendRequest {
                item_id,
                quantity: Some(quantity),
                notes: None,
            }
        }

        #[sqlx::test]
        async fn lending_twice_raises_the_open_loan(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let item = remote(&db, &hotel, "150.00").await;
            let r = reservations::create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id)))
                .await
                .unwrap();

            let first = lend(&db, hotel.property_id, r.id, &lend_req(item, 1)).await.unwrap();
            let second = lend(&db, hotel.property_id, r.id, &lend_req(item, 2)).await.unwrap();

            assert_eq!(first.id, second.id);
            assert_eq!(second.quantity, 3);
        }

        #[sqlx::test]
        async fn missing_units_are_billed_to_the_folio(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let item = remote(&db, &hotel, "150.00").await;
            let r = reservations::create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id)))
                .await
                .unwrap();
            let loan = lend(&db, hotel.property_id, r.id, &lend_req(item, 2)).await.unwrap();

            let req = ReturnLoanRequest {
                quantity_returned: Some(1),
                ..Default::default()
            };
            let outcome = return_loan(&db, hotel.property_id, loan.id, &req, TAX).await.unwrap();

            assert_eq!(outcome.missing, 1);
            let charge = outcome.charge.unwrap();
            assert_eq!(charge.description, "Replacement: TV remote");
            assert_eq!(charge.total, dec("174.00"));
            assert_eq!(outcome.loan.charge_id, Some(charge.id));
            assert_eq!(outcome.loan.quantity_returned, Some(1));
            assert_eq!(outcome.balance_due, Some(dec("2494.00")));
            assert_eq!(
                fixtures::folio_totals(&db, r.id).await,
                (dec("2494.00"), dec("0"), dec("2494.00"))
            );

            let again = return_loan(&db, hotel.property_id, loan.id, &req, TAX).await;
            assert!(matches!(again, Err(AppError::Conflict(_))));
        }

        #[sqlx::test]
        async fn waived_losses_leave_the_folio_alone(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let item = remote(&db, &hotel, "150.00").await;
            let r = reservations::create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id)))
                .await
                .unwrap();
            let loan = lend(&db, hotel.property_id, r.id, &lend_req(item, 1)).await.unwrap();

            let req = ReturnLoanRequest {
                quantity_returned: Some(0),
                charge_missing: Some(false),
                ..Default::default()
            };
            let outcome = return_loan(&db, hotel.property_id, loan.id, &req, TAX).await.unwrap();

            assert_eq!(outcome.missing, 1);
            assert!(outcome.charge.is_none());
            assert!(outcome.loan.returned_at.is_some());
            assert_eq!(fixtures::folio_totals(&db, r.id).await.0, dec("2320.00"));
        }
    }
}
