//! Reservation lifecycle. Every operation runs in one transaction with the
//! reservation row locked; room availability is serialized per room with an
//! advisory lock and backed by the exclusion constraint on `reservations`.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::RoomReleasePolicy;
use crate::db::next_document_number;
use crate::error::{AppError, AppResult};
use crate::models::{
    CleaningStatus, CreateReservationRequest, Discount, Reservation,
    ReservationAction, ReservationStatus, RoomMaintenance, RoomStatus, RoomType,
    UpdateReservationRequest, ROOM_HOLDING_STATUSES,
};
use crate::services::folio::{lock_reservation, Folio};
use crate::services::housekeeping::schedule_checkout_cleaning;
use crate::services::pricing::{quote_stay, Occupancy, StayQuote, StayRequest};

const NUMBER_PREFIX: &str = "RES";
const NUMBER_WIDTH: usize = 4;

/// Serializes availability checks and writes on one room until commit.
async fn lock_room(conn: &mut PgConnection, room_id: Uuid) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(room_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct RoomState {
    room_type_id: Uuid,
    status: String,
    maintenance_status: String,
}

impl RoomState {
    fn out_of_service(&self) -> bool {
        self.status == RoomStatus::OutOfService.as_str()
            || self.maintenance_status == RoomMaintenance::OutOfService.as_str()
    }
}

async fn room_state(conn: &mut PgConnection, property_id: Uuid, room_id: Uuid) -> AppResult<RoomState> {
    sqlx::query_as::<_, RoomState>(
        "SELECT room_type_id, status, maintenance_status FROM rooms WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
    )
    .bind(room_id)
    .bind(property_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Room not found".into()))
}

/// Locks the room and fails with `RoomUnavailable` when it is out of service
/// or another live reservation overlaps `[check_in, check_out)`.
async fn ensure_room_free(
    conn: &mut PgConnection,
    property_id: Uuid,
    room_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    exclude: Option<Uuid>,
) -> AppResult<RoomState> {
    lock_room(conn, room_id).await?;
    let room = room_state(conn, property_id, room_id).await?;
    if room.out_of_service() {
        return Err(AppError::RoomUnavailable { room_id });
    }

    let sql = format!(
        r#"SELECT number FROM reservations
        WHERE room_id = $1 AND property_id = $2 AND status IN {ROOM_HOLDING_STATUSES}
          AND check_in < $4 AND check_out > $3
          AND ($5::uuid IS NULL OR id <> $5)
        LIMIT 1"#
    );
    let clash: Option<String> = sqlx::query_scalar(&sql)
        .bind(room_id)
        .bind(property_id)
        .bind(check_in)
        .bind(check_out)
        .bind(exclude)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(number) = clash {
        tracing::debug!(%room_id, clashing = %number, "room already booked for the requested dates");
        return Err(AppError::RoomUnavailable { room_id });
    }
    Ok(room)
}

async fn load_room_type(conn: &mut PgConnection, property_id: Uuid, id: Uuid) -> AppResult<RoomType> {
    sqlx::query_as::<_, RoomType>(
        "SELECT * FROM room_types WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(property_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Room type not found".into()))
}

async fn tax_rate(conn: &mut PgConnection, property_id: Uuid, fallback: Decimal) -> AppResult<Decimal> {
    let rate: Option<Decimal> = sqlx::query_scalar("SELECT tax_rate FROM properties WHERE id = $1")
        .bind(property_id)
        .fetch_optional(conn)
        .await?;
    Ok(rate.unwrap_or(fallback))
}

async fn set_room_status(
    conn: &mut PgConnection,
    property_id: Uuid,
    room_id: Uuid,
    status: RoomStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE rooms SET status = $3 WHERE id = $1 AND property_id = $2")
        .bind(room_id)
        .bind(property_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Marks an idle room as held for an upcoming stay.
async fn hold_room(conn: &mut PgConnection, property_id: Uuid, room_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE rooms SET status = $3 WHERE id = $1 AND property_id = $2 AND status = $4")
        .bind(room_id)
        .bind(property_id)
        .bind(RoomStatus::Reserved.as_str())
        .bind(RoomStatus::Available.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns a room to `Available` after the reservation `released_by` let it go.
async fn release_room(
    conn: &mut PgConnection,
    property_id: Uuid,
    room_id: Uuid,
    released_by: Uuid,
    policy: RoomReleasePolicy,
) -> AppResult<()> {
    if policy == RoomReleasePolicy::Unclaimed {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM reservations WHERE room_id = $1 AND id <> $2 AND status IN {ROOM_HOLDING_STATUSES})"
        );
        let claimed: bool = sqlx::query_scalar(&sql)
            .bind(room_id)
            .bind(released_by)
            .fetch_one(&mut *conn)
            .await?;
        if claimed {
            tracing::debug!(%room_id, "room still claimed by another reservation; left as is");
            return Ok(());
        }
    }
    set_room_status(conn, property_id, room_id, RoomStatus::Available).await
}

struct Terms<'a> {
    check_in: NaiveDate,
    check_out: NaiveDate,
    nightly_rate: Option<Decimal>,
    adults: i32,
    children: i32,
    discount: Option<Discount>,
    room_type: Option<&'a RoomType>,
    tax_rate: Decimal,
}

fn quote(terms: Terms<'_>) -> AppResult<StayQuote> {
    let nightly_rate = terms
        .nightly_rate
        .or(terms.room_type.map(|t| t.base_rate))
        .ok_or_else(|| AppError::BadRequest("A nightly rate or a room type is required".into()))?;

    quote_stay(&StayRequest {
        check_in: terms.check_in,
        check_out: terms.check_out,
        nightly_rate,
        adults: terms.adults,
        children: terms.children,
        occupancy: terms.room_type.map(|t| Occupancy {
            base: t.base_occupancy,
            max: t.max_occupancy,
            extra_person_rate: t.extra_person_rate,
        }),
        discount: terms.discount,
        tax_rate: terms.tax_rate,
    })
}

pub async fn create(
    db: &PgPool,
    property_id: Uuid,
    default_tax_rate: Decimal,
    req: CreateReservationRequest,
) -> AppResult<Reservation> {
    let mut tx = db.begin().await?;

    let client_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1 AND property_id = $2 AND deleted_at IS NULL)",
    )
    .bind(req.client_id)
    .bind(property_id)
    .fetch_one(&mut *tx)
    .await?;
    if !client_exists {
        return Err(AppError::NotFound("Client not found".into()));
    }

    let room_type_id = match req.room_id {
        Some(room_id) => {
            let room = ensure_room_free(&mut tx, property_id, room_id, req.check_in, req.check_out, None).await?;
            Some(req.room_type_id.unwrap_or(room.room_type_id))
        }
        None => req.room_type_id,
    };
    let room_type = match room_type_id {
        Some(id) => Some(load_room_type(&mut tx, property_id, id).await?),
        None => None,
    };

    let stay = quote(Terms {
        check_in: req.check_in,
        check_out: req.check_out,
        nightly_rate: req.nightly_rate,
        adults: req.adults.unwrap_or(1),
        children: req.children.unwrap_or(0),
        discount: req.discount,
        room_type: room_type.as_ref(),
        tax_rate: tax_rate(&mut tx, property_id, default_tax_rate).await?,
    })?;
    let nightly_rate = req
        .nightly_rate
        .or(room_type.as_ref().map(|t| t.base_rate))
        .unwrap_or_default();

    let number = next_document_number(&mut tx, property_id, NUMBER_PREFIX, Utc::now().year(), NUMBER_WIDTH).await?;

    let insert = sqlx::query_as::<_, Reservation>(
        r#"INSERT INTO reservations
            (id, property_id, number, client_id, room_id, room_type_id, check_in, check_out, arrival_time,
             adults, children, nights, nightly_rate, subtotal, extras, discount, tax, total, total_paid,
             balance_due, status, special_requests, internal_notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, 0, $18, $19, $20, $21)
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(property_id)
    .bind(&number)
    .bind(req.client_id)
    .bind(req.room_id)
    .bind(room_type_id)
    .bind(req.check_in)
    .bind(req.check_out)
    .bind(&req.arrival_time)
    .bind(req.adults.unwrap_or(1))
    .bind(req.children.unwrap_or(0))
    .bind(stay.nights)
    .bind(nightly_rate)
    .bind(stay.subtotal)
    .bind(stay.extras)
    .bind(stay.discount)
    .bind(stay.tax)
    .bind(stay.total)
    .bind(ReservationStatus::Pending.as_str())
    .bind(&req.special_requests)
    .bind(&req.internal_notes)
    .fetch_one(&mut *tx)
    .await;

    let reservation = match (insert, req.room_id) {
        (Ok(r), _) => r,
        (Err(e), Some(room_id)) => return Err(AppError::room_conflict(e, room_id)),
        (Err(e), None) => return Err(e.into()),
    };

    if let Some(room_id) = reservation.room_id {
        hold_room(&mut tx, property_id, room_id).await?;
    }

    tx.commit().await?;
    tracing::info!(%property_id, reservation = %reservation.number, total = %reservation.total, "reservation created");
    Ok(reservation)
}

pub async fn update(
    db: &PgPool,
    property_id: Uuid,
    id: Uuid,
    default_tax_rate: Decimal,
    req: UpdateReservationRequest,
) -> AppResult<Reservation> {
    let mut tx = db.begin().await?;
    let current = lock_reservation(&mut tx, property_id, id).await?;
    current.status()?.apply(ReservationAction::Amend)?;

    let check_in = req.check_in.unwrap_or(current.check_in);
    let check_out = req.check_out.unwrap_or(current.check_out);
    let room_id = req.room_id.or(current.room_id);
    let room_changed = room_id != current.room_id;

    let mut room_type_id = current.room_type_id;
    if let Some(room_id) = room_id {
        let room = ensure_room_free(&mut tx, property_id, room_id, check_in, check_out, Some(id)).await?;
        if room_changed {
            room_type_id = Some(room.room_type_id);
        }
    }
    let room_type = match room_type_id {
        Some(type_id) => Some(load_room_type(&mut tx, property_id, type_id).await?),
        None => None,
    };

    let adults = req.adults.unwrap_or(current.adults);
    let children = req.children.unwrap_or(current.children);
    let nightly_rate = req.nightly_rate.unwrap_or(current.nightly_rate);
    let discount = req.discount.or_else(|| {
        (current.discount > Decimal::ZERO).then_some(Discount::Amount(current.discount))
    });

    let stay = quote(Terms {
        check_in,
        check_out,
        nightly_rate: Some(nightly_rate),
        adults,
        children,
        discount,
        room_type: room_type.as_ref(),
        tax_rate: tax_rate(&mut tx, property_id, default_tax_rate).await?,
    })?;
    let folio = Folio::of(&current).reprice_stay(current.stay_total(), stay.total);

    let updated = sqlx::query_as::<_, Reservation>(
        r#"UPDATE reservations SET
            room_id = $2, room_type_id = $3, check_in = $4, check_out = $5, arrival_time = $6,
            adults = $7, children = $8, nights = $9, nightly_rate = $10, subtotal = $11, extras = $12,
            discount = $13, tax = $14, total = $15, balance_due = $15 - total_paid,
            special_requests = $16, internal_notes = $17, updated_at = NOW()
        WHERE id = $1
        RETURNING *"#,
    )
    .bind(id)
    .bind(room_id)
    .bind(room_type_id)
    .bind(check_in)
    .bind(check_out)
    .bind(req.arrival_time.as_ref().or(current.arrival_time.as_ref()))
    .bind(adults)
    .bind(children)
    .bind(stay.nights)
    .bind(nightly_rate)
    .bind(stay.subtotal)
    .bind(stay.extras)
    .bind(stay.discount)
    .bind(stay.tax)
    .bind(folio.total)
    .bind(req.special_requests.as_ref().or(current.special_requests.as_ref()))
    .bind(req.internal_notes.as_ref().or(current.internal_notes.as_ref()))
    .fetch_one(&mut *tx)
    .await;

    let updated = match (updated, room_id) {
        (Ok(r), _) => r,
        (Err(e), Some(room_id)) => return Err(AppError::room_conflict(e, room_id)),
        (Err(e), None) => return Err(e.into()),
    };

    if updated.balance_due != folio.balance_due() {
        return Err(AppError::Internal(format!(
            "reservation {} balance drifted during update",
            updated.number
        )));
    }

    if room_changed {
        if let Some(old) = current.room_id {
            release_room(&mut tx, property_id, old, id, RoomReleasePolicy::Unclaimed).await?;
        }
        if let Some(new) = room_id {
            hold_room(&mut tx, property_id, new).await?;
        }
    }

    tx.commit().await?;
    tracing::info!(%property_id, reservation = %updated.number, "reservation updated");
    Ok(updated)
}

async fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: ReservationStatus,
) -> AppResult<Reservation> {
    let reservation = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_one(conn)
    .await?;
    Ok(reservation)
}

pub async fn confirm(db: &PgPool, property_id: Uuid, id: Uuid) -> AppResult<Reservation> {
    let mut tx = db.begin().await?;
    let current = lock_reservation(&mut tx, property_id, id).await?;
    let next = current.status()?.apply(ReservationAction::Confirm)?;
    let reservation = set_status(&mut tx, id, next).await?;
    tx.commit().await?;

    tracing::info!(%property_id, reservation = %reservation.number, "reservation confirmed");
    Ok(reservation)
}

pub async fn check_in(
    db: &PgPool,
    property_id: Uuid,
    id: Uuid,
    room_override: Option<Uuid>,
) -> AppResult<Reservation> {
    let mut tx = db.begin().await?;
    let current = lock_reservation(&mut tx, property_id, id).await?;
    let next = current.status()?.apply(ReservationAction::CheckIn)?;
    let room_id = room_override
        .or(current.room_id)
        .ok_or(AppError::NoRoomAssigned)?;

    ensure_room_free(&mut tx, property_id, room_id, current.check_in, current.check_out, Some(id)).await?;

    let occupied_by: Option<String> = sqlx::query_scalar(
        "SELECT number FROM reservations WHERE room_id = $1 AND status = $2 AND id <> $3 LIMIT 1",
    )
    .bind(room_id)
    .bind(ReservationStatus::CheckIn.as_str())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(number) = occupied_by {
        tracing::warn!(%room_id, occupied_by = %number, "check-in refused; room is occupied");
        return Err(AppError::RoomUnavailable { room_id });
    }

    let reservation = sqlx::query_as::<_, Reservation>(
        r#"UPDATE reservations
        SET status = $2, room_id = $3, checked_in_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *"#,
    )
    .bind(id)
    .bind(next.as_str())
    .bind(room_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::room_conflict(e, room_id))?;

    set_room_status(&mut tx, property_id, room_id, RoomStatus::Occupied).await?;
    if let Some(previous) = current.room_id.filter(|r| *r != room_id) {
        release_room(&mut tx, property_id, previous, id, RoomReleasePolicy::Unclaimed).await?;
    }

    sqlx::query("UPDATE clients SET total_stays = total_stays + 1 WHERE id = $1")
        .bind(reservation.client_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(%property_id, reservation = %reservation.number, %room_id, "guest checked in");
    Ok(reservation)
}

pub async fn check_out(db: &PgPool, property_id: Uuid, id: Uuid) -> AppResult<Reservation> {
    let mut tx = db.begin().await?;
    let current = lock_reservation(&mut tx, property_id, id).await?;
    let next = current.status()?.apply(ReservationAction::CheckOut)?;
    Folio::of(&current).ensure_settled()?;

    let reservation = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = $2, checked_out_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;

    if let Some(room_id) = reservation.room_id {
        sqlx::query(
            "UPDATE rooms SET status = $3, cleaning_status = $4 WHERE id = $1 AND property_id = $2",
        )
        .bind(room_id)
        .bind(property_id)
        .bind(RoomStatus::Available.as_str())
        .bind(CleaningStatus::Dirty.as_str())
        .execute(&mut *tx)
        .await?;

        schedule_checkout_cleaning(
            &mut tx,
            property_id,
            room_id,
            Utc::now().date_naive(),
            &reservation.number,
        )
        .await?;
    }

    tx.commit().await?;
    tracing::info!(%property_id, reservation = %reservation.number, "guest checked out");
    Ok(reservation)
}

/// Appends a line to the internal notes.
fn append_note(notes: Option<&str>, line: &str) -> String {
    match notes.map(str::trim_end).filter(|n| !n.is_empty()) {
        Some(existing) => format!("{existing}\n{line}"),
        None => line.to_string(),
    }
}

fn cancellation_note(reason: Option<&str>) -> String {
    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason given");
    format!("Cancelled: {reason}")
}

async fn close_without_stay(
    db: &PgPool,
    property_id: Uuid,
    id: Uuid,
    action: ReservationAction,
    note: Option<String>,
    policy: RoomReleasePolicy,
) -> AppResult<Reservation> {
    let mut tx = db.begin().await?;
    let current = lock_reservation(&mut tx, property_id, id).await?;
    let next = current.status()?.apply(action)?;

    let notes = match note {
        Some(line) => Some(append_note(current.internal_notes.as_deref(), &line)),
        None => current.internal_notes.clone(),
    };

    let reservation = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = $2, internal_notes = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next.as_str())
    .bind(notes)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(room_id) = reservation.room_id {
        lock_room(&mut tx, room_id).await?;
        release_room(&mut tx, property_id, room_id, id, policy).await?;
    }

    tx.commit().await?;
    tracing::info!(%property_id, reservation = %reservation.number, status = %next, "reservation closed");
    Ok(reservation)
}

pub async fn cancel(
    db: &PgPool,
    property_id: Uuid,
    id: Uuid,
    reason: Option<&str>,
    policy: RoomReleasePolicy,
) -> AppResult<Reservation> {
    let note = cancellation_note(reason);
    close_without_stay(db, property_id, id, ReservationAction::Cancel, Some(note), policy).await
}

pub async fn no_show(
    db: &PgPool,
    property_id: Uuid,
    id: Uuid,
    policy: RoomReleasePolicy,
) -> AppResult<Reservation> {
    close_without_stay(db, property_id, id, ReservationAction::NoShow, None, policy).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_reason_defaults() {
        assert_eq!(cancellation_note(None), "Cancelled: No reason given");
        assert_eq!(cancellation_note(Some("  ")), "Cancelled: No reason given");
        assert_eq!(cancellation_note(Some("Flight cancelled")), "Cancelled: Flight cancelled");
    }

    #[test]
    fn notes_are_appended_on_a_new_line() {
        assert_eq!(append_note(None, "Cancelled: x"), "Cancelled: x");
        assert_eq!(append_note(Some(""), "Cancelled: x"), "Cancelled: x");
        assert_eq!(
            append_note(Some("Late arrival"), "Cancelled: x"),
            "Late arrival\nCancelled: x"
        );
    }

    #[test]
    fn quote_needs_a_rate_source() {
        let terms = Terms {
            check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            nightly_rate: None,
            adults: 2,
            children: 0,
            discount: None,
            room_type: None,
            tax_rate: Decimal::new(16, 2),
        };
        assert!(matches!(quote(terms), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn quote_uses_explicit_rate() {
        let terms = Terms {
            check_in: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            nightly_rate: Some(Decimal::new(1000, 0)),
            adults: 2,
            children: 0,
            discount: None,
            room_type: None,
            tax_rate: Decimal::new(16, 2),
        };
        let stay = quote(terms).unwrap();
        assert_eq!(stay.total, Decimal::new(2320, 0));
        assert_eq!(stay.nights, 2);
    }

    mod store {
        use super::*;
        use crate::fixtures::{self, dec, seed_hotel, stay};

        const TAX: Decimal = Decimal::from_parts(16, 0, 0, false, 2);

        #[sqlx::test]
        async fn create_prices_the_stay_and_holds_the_room(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let r = create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id))).await.unwrap();

            assert_eq!(r.nights, 2);
            assert_eq!(r.subtotal, dec("2000.00"));
            assert_eq!(r.tax, dec("320.00"));
            assert_eq!(r.total, dec("2320.00"));
            assert_eq!(r.balance_due, dec("2320.00"));
            assert_eq!(r.status, ReservationStatus::Pending.as_str());
            assert!(r.number.starts_with("RES-") && r.number.ends_with("-0001"));

            let (status, _) = fixtures::room_status(&db, hotel.room_id).await;
            assert_eq!(status, RoomStatus::Reserved.as_str());
        }

        #[sqlx::test]
        async fn overlapping_creates_on_one_room_admit_one(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let first = stay(&hotel, Some(hotel.room_id));
            let mut second = stay(&hotel, Some(hotel.room_id));
            second.check_in = fixtures::date(2025, 6, 2);
            second.check_out = fixtures::date(2025, 6, 4);

            let (a, b) = tokio::join!(
                create(&db, hotel.property_id, TAX, first),
                create(&db, hotel.property_id, TAX, second),
            );

            let results = [a, b];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(AppError::RoomUnavailable { room_id }) if *room_id == hotel.room_id)));

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE room_id = $1")
                .bind(hotel.room_id)
                .fetch_one(&db)
                .await
                .unwrap();
            assert_eq!(count, 1);
        }

        #[sqlx::test]
        async fn check_in_without_a_room_changes_nothing(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let mut req = stay(&hotel, None);
            req.room_type_id = Some(hotel.room_type_id);
            let r = create(&db, hotel.property_id, TAX, req).await.unwrap();

            let err = check_in(&db, hotel.property_id, r.id, None).await.unwrap_err();
            assert!(matches!(err, AppError::NoRoomAssigned));

            let status: String = sqlx::query_scalar("SELECT status FROM reservations WHERE id = $1")
                .bind(r.id)
                .fetch_one(&db)
                .await
                .unwrap();
            assert_eq!(status, ReservationStatus::Pending.as_str());
        }

        #[sqlx::test]
        async fn check_in_occupies_the_room(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let r = create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id))).await.unwrap();
            confirm(&db, hotel.property_id, r.id).await.unwrap();

            let r = check_in(&db, hotel.property_id, r.id, None).await.unwrap();
            assert_eq!(r.status, ReservationStatus::CheckIn.as_str());
            assert!(r.checked_in_at.is_some());

            let (status, _) = fixtures::room_status(&db, hotel.room_id).await;
            assert_eq!(status, RoomStatus::Occupied.as_str());

            let stays: i32 = sqlx::query_scalar("SELECT total_stays FROM clients WHERE id = $1")
                .bind(hotel.client_id)
                .fetch_one(&db)
                .await
                .unwrap();
            assert_eq!(stays, 1);
        }

        #[sqlx::test]
        async fn check_out_waits_for_the_balance(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let r = create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id))).await.unwrap();
            check_in(&db, hotel.property_id, r.id, None).await.unwrap();

            fixtures::post_payment(&db, &hotel, r.id, dec("1000.00")).await;
            match check_out(&db, hotel.property_id, r.id).await {
                Err(AppError::OutstandingBalance { balance }) => assert_eq!(balance, dec("1320.00")),
                other => panic!("expected outstanding balance, got {other:?}"),
            }
            let (status, _) = fixtures::room_status(&db, hotel.room_id).await;
            assert_eq!(status, RoomStatus::Occupied.as_str());

            fixtures::post_payment(&db, &hotel, r.id, dec("1320.00")).await;
            let r = check_out(&db, hotel.property_id, r.id).await.unwrap();
            assert_eq!(r.status, ReservationStatus::CheckOut.as_str());
            assert_eq!(r.balance_due, Decimal::ZERO);

            let (status, cleaning) = fixtures::room_status(&db, hotel.room_id).await;
            assert_eq!(status, RoomStatus::Available.as_str());
            assert_eq!(cleaning, CleaningStatus::Dirty.as_str());

            let task: (String, String, String) = sqlx::query_as(
                "SELECT kind, priority, status FROM housekeeping_tasks WHERE room_id = $1",
            )
            .bind(hotel.room_id)
            .fetch_one(&db)
            .await
            .unwrap();
            assert_eq!(task, ("Checkout".to_string(), "High".to_string(), "Pending".to_string()));
        }

        #[sqlx::test]
        async fn cancel_frees_the_room_and_notes_the_reason(db: PgPool) {
            let hotel = seed_hotel(&db).await;
            let r = create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id))).await.unwrap();

            let r = cancel(&db, hotel.property_id, r.id, Some("Flight cancelled"), RoomReleasePolicy::Always)
                .await
                .unwrap();
            assert_eq!(r.status, ReservationStatus::Cancelled.as_str());
            assert_eq!(r.internal_notes.as_deref(), Some("Cancelled: Flight cancelled"));

            let (status, _) = fixtures::room_status(&db, hotel.room_id).await;
            assert_eq!(status, RoomStatus::Available.as_str());

            // the dates are free again
            assert!(create(&db, hotel.property_id, TAX, stay(&hotel, Some(hotel.room_id))).await.is_ok());
        }
    }
}
