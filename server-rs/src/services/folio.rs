use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Charge, Payment, Reservation};
use crate::services::pricing::add_amounts;

/// Running account of a reservation. The balance is always derived, never
/// adjusted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Folio {
    pub total: Decimal,
    pub total_paid: Decimal,
}

impl Folio {
    pub fn of(reservation: &Reservation) -> Self {
        Self {
            total: reservation.total,
            total_paid: reservation.total_paid,
        }
    }

    pub fn balance_due(&self) -> Decimal {
        self.total - self.total_paid
    }

    pub fn post_charge(self, amount: Decimal) -> Self {
        Self {
            total: self.total + amount,
            ..self
        }
    }

    pub fn reverse_charge(self, amount: Decimal) -> Self {
        Self {
            total: self.total - amount,
            ..self
        }
    }

    pub fn post_payment(self, amount: Decimal) -> AppResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("Payment amount must be positive".into()));
        }
        Ok(Self {
            total_paid: add_amounts(self.total_paid, amount, "Amount paid")?,
            ..self
        })
    }

    pub fn reverse_payment(self, amount: Decimal) -> Self {
        Self {
            total_paid: self.total_paid - amount,
            ..self
        }
    }

    /// Swaps the room portion of the bill, keeping posted charges.
    pub fn reprice_stay(self, old_stay: Decimal, new_stay: Decimal) -> Self {
        Self {
            total: self.total - old_stay + new_stay,
            ..self
        }
    }

    /// Checkout is only allowed once nothing is owed.
    pub fn ensure_settled(&self) -> AppResult<()> {
        let balance = self.balance_due();
        if balance > Decimal::ZERO {
            return Err(AppError::OutstandingBalance { balance });
        }
        Ok(())
    }
}

/// Loads a reservation of the property and locks its row until commit.
pub async fn lock_reservation(
    conn: &mut PgConnection,
    property_id: Uuid,
    reservation_id: Uuid,
) -> AppResult<Reservation> {
    sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE id = $1 AND property_id = $2 FOR UPDATE",
    )
    .bind(reservation_id)
    .bind(property_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Reservation not found".into()))
}

/// Persists new folio totals and recomputes the balance from them.
pub async fn write_folio(conn: &mut PgConnection, reservation_id: Uuid, folio: Folio) -> AppResult<Decimal> {
    let (total, total_paid, balance_due): (Decimal, Decimal, Decimal) = sqlx::query_as(
        r#"UPDATE reservations
        SET total = $2, total_paid = $3, balance_due = $2 - $3, updated_at = NOW()
        WHERE id = $1
        RETURNING total, total_paid, balance_due"#,
    )
    .bind(reservation_id)
    .bind(folio.total)
    .bind(folio.total_paid)
    .fetch_one(conn)
    .await?;

    if balance_due != total - total_paid {
        return Err(AppError::Internal(format!(
            "folio of reservation {reservation_id} is inconsistent: {total} - {total_paid} != {balance_due}"
        )));
    }
    Ok(balance_due)
}

/// A folio line taken back, with the reservation it belonged to and the
/// balance left after the reversal.
#[derive(Debug)]
pub struct Reversal<T> {
    pub line: T,
    pub reservation: Reservation,
    pub balance_due: Decimal,
}

/// Locks the reservation that owns a folio line. The line itself is read
/// unlocked only to find its reservation.
async fn lock_owner(
    conn: &mut PgConnection,
    table: &str,
    property_id: Uuid,
    line_id: Uuid,
    not_found: &str,
) -> AppResult<Reservation> {
    let sql = format!("SELECT reservation_id FROM {table} WHERE id = $1 AND property_id = $2");
    let reservation_id: Uuid = sqlx::query_scalar(&sql)
        .bind(line_id)
        .bind(property_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(not_found.into()))?;
    lock_reservation(conn, property_id, reservation_id).await
}

/// Removes a charge and takes its amount off the folio. With the
/// reservation locked, only the caller whose delete returns the row
/// reverses it; a concurrent second delete finds nothing.
pub async fn reverse_charge(db: &PgPool, property_id: Uuid, charge_id: Uuid) -> AppResult<Reversal<Charge>> {
    let mut tx = db.begin().await?;
    let reservation = lock_owner(&mut tx, "charges", property_id, charge_id, "Charge not found").await?;

    let charge: Charge = sqlx::query_as("DELETE FROM charges WHERE id = $1 AND property_id = $2 RETURNING *")
        .bind(charge_id)
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Charge not found".into()))?;

    let balance_due = write_folio(&mut tx, reservation.id, Folio::of(&reservation).reverse_charge(charge.total)).await?;
    tx.commit().await?;

    Ok(Reversal {
        line: charge,
        reservation,
        balance_due,
    })
}

/// Refunds a payment by removing it from the folio, under the same locking
/// as [`reverse_charge`].
pub async fn reverse_payment(db: &PgPool, property_id: Uuid, payment_id: Uuid) -> AppResult<Reversal<Payment>> {
    let mut tx = db.begin().await?;
    let reservation = lock_owner(&mut tx, "payments", property_id, payment_id, "Payment not found").await?;

    let payment: Payment = sqlx::query_as("DELETE FROM payments WHERE id = $1 AND property_id = $2 RETURNING *")
        .bind(payment_id)
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;

    let balance_due =
        write_folio(&mut tx, reservation.id, Folio::of(&reservation).reverse_payment(payment.amount)).await?;
    tx.commit().await?;

    Ok(Reversal {
        line: payment,
        reservation,
        balance_due,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn folio(total: &str, paid: &str) -> Folio {
        Folio {
            total: dec(total),
            total_paid: dec(paid),
        }
    }

    #[test]
    fn partial_payment_leaves_a_balance() {
        let f = folio("2320", "0").post_payment(dec("1000")).unwrap();
        assert_eq!(f.balance_due(), dec("1320"));
        match f.ensure_settled() {
            Err(AppError::OutstandingBalance { balance }) => assert_eq!(balance, dec("1320")),
            other => panic!("expected outstanding balance, got {other:?}"),
        }
    }

    #[test]
    fn settled_folio_allows_checkout() {
        let f = folio("2320", "1000").post_payment(dec("1320")).unwrap();
        assert_eq!(f.balance_due(), Decimal::ZERO);
        assert!(f.ensure_settled().is_ok());
    }

    #[test]
    fn overpayment_counts_as_settled() {
        let f = folio("100", "150");
        assert_eq!(f.balance_due(), dec("-50"));
        assert!(f.ensure_settled().is_ok());
    }

    #[test]
    fn non_positive_payments_are_rejected() {
        assert!(folio("100", "0").post_payment(Decimal::ZERO).is_err());
        assert!(folio("100", "0").post_payment(dec("-5")).is_err());
    }

    #[test]
    fn oversized_payments_are_rejected() {
        assert!(matches!(
            folio("100", "0").post_payment(Decimal::MAX),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn charges_and_reversals_move_the_total() {
        let f = folio("2320", "1000").post_charge(dec("116"));
        assert_eq!(f.total, dec("2436"));
        assert_eq!(f.balance_due(), dec("1436"));

        let f = f.reverse_charge(dec("116")).reverse_payment(dec("1000"));
        assert_eq!(f, folio("2320", "0"));
    }

    #[test]
    fn repricing_keeps_posted_charges() {
        // 2320 stay + 116 minibar; stay shrinks to 1160
        let f = folio("2436", "0").reprice_stay(dec("2320"), dec("1160"));
        assert_eq!(f.total, dec("1276"));
    }

    mod store {
        use super::*;
        use crate::fixtures::{self, seed_hotel, stay};
        use crate::services::reservations;

        #[sqlx::test]
        async fn concurrent_charge_deletes_reverse_once(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let r = reservations::create(&db, hotel.property_id, dec("0.16"), stay(&hotel, Some(hotel.room_id)))
                .await
                .unwrap();
            let charge = fixtures::post_charge(&db, &hotel, r.id, dec("116.00")).await;
            assert_eq!(fixtures::folio_totals(&db, r.id).await.0, dec("2436.00"));

            let (a, b) = tokio::join!(
                reverse_charge(&db, hotel.property_id, charge),
                reverse_charge(&db, hotel.property_id, charge),
            );
            let results = [a, b];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results.iter().any(|r| matches!(r, Err(AppError::NotFound(_)))));

            assert_eq!(
                fixtures::folio_totals(&db, r.id).await,
                (dec("2320.00"), Decimal::ZERO, dec("2320.00"))
            );
        }

        #[sqlx::test]
        async fn concurrent_refunds_reverse_once(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let r = reservations::create(&db, hotel.property_id, dec("0.16"), stay(&hotel, Some(hotel.room_id)))
                .await
                .unwrap();
            let payment = fixtures::post_payment(&db, &hotel, r.id, dec("1000.00")).await;

            let (a, b) = tokio::join!(
                reverse_payment(&db, hotel.property_id, payment),
                reverse_payment(&db, hotel.property_id, payment),
            );
            let results = [a, b];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

            let done = results.into_iter().find_map(Result::ok).unwrap();
            assert_eq!(done.line.amount, dec("1000.00"));
            assert_eq!(done.balance_due, dec("2320.00"));
            assert_eq!(
                fixtures::folio_totals(&db, r.id).await,
                (dec("2320.00"), Decimal::ZERO, dec("2320.00"))
            );
        }

        #[sqlx::test]
        async fn reversing_another_propertys_charge_is_not_found(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let other = seed_hotel(&db).await;
            let r = reservations::create(&db, hotel.property_id, dec("0.16"), stay(&hotel, Some(hotel.room_id)))
                .await
                .unwrap();
            let charge = fixtures::post_charge(&db, &hotel, r.id, dec("50.00")).await;

            assert!(matches!(
                reverse_charge(&db, other.property_id, charge).await,
                Err(AppError::NotFound(_))
            ));
            assert_eq!(fixtures::folio_totals(&db, r.id).await.0, dec("2370.00"));
        }
    }
}
