//! Seed data for tests that run against a migrated database.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CreateReservationRequest;

/// One property with a subscription-free account, a room type, a room and a
/// guest. Tax rate 16 %, base rate 1000.00.
pub struct Hotel {
    pub account_id: Uuid,
    pub property_id: Uuid,
    pub room_type_id: Uuid,
    pub room_id: Uuid,
    pub client_id: Uuid,
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub async fn seed_hotel(db: &PgPool) -> Hotel {
    let account_id = Uuid::new_v4();
    sqlx::query("INSERT INTO accounts (id, name, email) VALUES ($1, 'Casa Azul', $2)")
        .bind(account_id)
        .bind(format!("{account_id}@example.com"))
        .execute(db)
        .await
        .unwrap();

    let property_id = Uuid::new_v4();
    sqlx::query("INSERT INTO properties (id, account_id, name, tax_rate) VALUES ($1, $2, 'Hotel Casa Azul', 0.16)")
        .bind(property_id)
        .bind(account_id)
        .execute(db)
        .await
        .unwrap();

    let room_type_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO room_types (id, property_id, code, name, base_occupancy, max_occupancy, base_rate)
        VALUES ($1, $2, 'DBL', 'Double', 2, 4, 1000.00)"#,
    )
    .bind(room_type_id)
    .bind(property_id)
    .execute(db)
    .await
    .unwrap();

    let client_id = Uuid::new_v4();
    sqlx::query("INSERT INTO clients (id, property_id, first_name, last_name) VALUES ($1, $2, 'Lucia', 'Rey')")
        .bind(client_id)
        .bind(property_id)
        .execute(db)
        .await
        .unwrap();

    let mut hotel = Hotel {
        account_id,
        property_id,
        room_type_id,
        room_id: Uuid::nil(),
        client_id,
    };
    hotel.room_id = add_room(db, &hotel, "101").await;
    hotel
}

pub async fn add_room(db: &PgPool, hotel: &Hotel, number: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO rooms (id, property_id, room_type_id, number) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(hotel.property_id)
        .bind(hotel.room_type_id)
        .bind(number)
        .execute(db)
        .await
        .unwrap();
    id
}

/// 2025-06-01 to 2025-06-03 in `room_id` at the room type's rate.
pub fn stay(hotel: &Hotel, room_id: Option<Uuid>) -> CreateReservationRequest {
    CreateReservationRequest {
        client_id: hotel.client_id,
        room_id,
        room_type_id: None,
        check_in: date(2025, 6, 1),
        check_out: date(2025, 6, 3),
        arrival_time: None,
        adults: Some(2),
        children: None,
        nightly_rate: None,
        discount: None,
        special_requests: None,
        internal_notes: None,
    }
}

pub async fn room_status(db: &PgPool, room_id: Uuid) -> (String, String) {
    sqlx::query_as("SELECT status, cleaning_status FROM rooms WHERE id = $1")
        .bind(room_id)
        .fetch_one(db)
        .await
        .unwrap()
}

/// Posts a pre-priced charge line and moves the folio the way the charge
/// handler does.
pub async fn post_charge(db: &PgPool, hotel: &Hotel, reservation_id: Uuid, total: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO charges (id, property_id, reservation_id, description, quantity, unit_price, subtotal, tax, total)
        VALUES ($1, $2, $3, 'Minibar', 1, $4, $4, 0, $4)"#,
    )
    .bind(id)
    .bind(hotel.property_id)
    .bind(reservation_id)
    .bind(total)
    .execute(db)
    .await
    .unwrap();
    sqlx::query("UPDATE reservations SET total = total + $2, balance_due = balance_due + $2 WHERE id = $1")
        .bind(reservation_id)
        .bind(total)
        .execute(db)
        .await
        .unwrap();
    id
}

pub async fn post_payment(db: &PgPool, hotel: &Hotel, reservation_id: Uuid, amount: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO payments (id, property_id, reservation_id, number, amount) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(hotel.property_id)
        .bind(reservation_id)
        .bind(format!("PAY-TEST-{id}"))
        .bind(amount)
        .execute(db)
        .await
        .unwrap();
    sqlx::query("UPDATE reservations SET total_paid = total_paid + $2, balance_due = balance_due - $2 WHERE id = $1")
        .bind(reservation_id)
        .bind(amount)
        .execute(db)
        .await
        .unwrap();
    id
}

pub async fn folio_totals(db: &PgPool, reservation_id: Uuid) -> (Decimal, Decimal, Decimal) {
    sqlx::query_as("SELECT total, total_paid, balance_due FROM reservations WHERE id = $1")
        .bind(reservation_id)
        .fetch_one(db)
        .await
        .unwrap()
}
