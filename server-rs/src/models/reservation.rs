use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

text_enum!(
    ReservationStatus {
        Pending => "Pending",
        Confirmed => "Confirmed",
        CheckIn => "CheckIn",
        CheckOut => "CheckOut",
        Cancelled => "Cancelled",
        NoShow => "NoShow",
    }
);

/// Operations that move (or, for `Amend`, keep) a reservation's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationAction {
    Confirm,
    CheckIn,
    CheckOut,
    Cancel,
    NoShow,
    Amend,
}

impl ReservationAction {
    pub fn verb(self) -> &'static str {
        match self {
            ReservationAction::Confirm => "confirm",
            ReservationAction::CheckIn => "check in",
            ReservationAction::CheckOut => "check out",
            ReservationAction::Cancel => "cancel",
            ReservationAction::NoShow => "mark as no-show",
            ReservationAction::Amend => "modify",
        }
    }
}

impl ReservationStatus {
    /// Returns the status reached by applying `action`, or `InvalidTransition`.
    ///
    /// ```text
    /// Pending ──confirm──▶ Confirmed
    /// Pending | Confirmed ──check in──▶ CheckIn ──check out──▶ CheckOut
    /// Pending | Confirmed ──cancel──▶ Cancelled
    /// Pending | Confirmed ──no-show──▶ NoShow
    /// ```
    pub fn apply(self, action: ReservationAction) -> AppResult<ReservationStatus> {
        use ReservationAction as A;
        use ReservationStatus::*;

        let next = match (self, action) {
            (Pending, A::Confirm) => Some(Confirmed),
            (Pending | Confirmed, A::CheckIn) => Some(CheckIn),
            (CheckIn, A::CheckOut) => Some(CheckOut),
            (Pending | Confirmed, A::Cancel) => Some(Cancelled),
            (Pending | Confirmed, A::NoShow) => Some(NoShow),
            (Pending | Confirmed, A::Amend) => Some(self),
            _ => None,
        };

        next.ok_or_else(|| AppError::InvalidTransition {
            from: self.as_str().to_string(),
            action: action.verb(),
        })
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationStatus::CheckOut | ReservationStatus::Cancelled | ReservationStatus::NoShow
        )
    }

    /// Whether the reservation still blocks its room's nights.
    pub fn holds_room(self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::CheckIn
        )
    }

    pub fn accepts_charges(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::NoShow)
    }
}

/// Statuses that still block a room, as SQL literals for `IN (...)` clauses.
pub const ROOM_HOLDING_STATUSES: &str = "('Pending', 'Confirmed', 'CheckIn')";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    /// Flat amount off the stay.
    Amount(Decimal),
    /// Percentage of the stay, 0 to 100.
    Percent(Decimal),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub property_id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub room_id: Option<Uuid>,
    pub room_type_id: Option<Uuid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub arrival_time: Option<String>,
    pub adults: i32,
    pub children: i32,
    pub nights: i32,
    pub nightly_rate: Decimal,
    pub subtotal: Decimal,
    pub extras: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub total_paid: Decimal,
    pub balance_due: Decimal,
    pub status: String,
    pub special_requests: Option<String>,
    pub internal_notes: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn status(&self) -> AppResult<ReservationStatus> {
        super::parse_stored("reservation status", &self.status)
    }

    /// Sum of the room portion of the bill: everything except posted charges.
    pub fn stay_total(&self) -> Decimal {
        let discounted = self.subtotal + self.extras - self.discount;
        discounted + self.tax
    }
}

/// Reservation joined with guest and room labels for list views.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSummary {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub room_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub room_type_name: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i32,
    pub adults: i32,
    pub children: i32,
    pub total: Decimal,
    pub balance_due: Decimal,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub client_id: Uuid,
    pub room_id: Option<Uuid>,
    pub room_type_id: Option<Uuid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub arrival_time: Option<String>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    /// Overrides the room type's base rate.
    pub nightly_rate: Option<Decimal>,
    pub discount: Option<Discount>,
    pub special_requests: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReservationRequest {
    pub room_id: Option<Uuid>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub arrival_time: Option<String>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub nightly_rate: Option<Decimal>,
    pub discount: Option<Discount>,
    pub special_requests: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// Assigns (or reassigns) the room at the desk.
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationQuery {
    pub status: Option<ReservationStatus>,
    pub client_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReservationAction as A;
    use ReservationStatus::*;

    #[test]
    fn happy_path_walks_to_checkout() {
        let confirmed = Pending.apply(A::Confirm).unwrap();
        assert_eq!(confirmed, Confirmed);
        let in_house = confirmed.apply(A::CheckIn).unwrap();
        assert_eq!(in_house, CheckIn);
        assert_eq!(in_house.apply(A::CheckOut).unwrap(), CheckOut);
    }

    #[test]
    fn pending_can_check_in_without_confirmation() {
        assert_eq!(Pending.apply(A::CheckIn).unwrap(), CheckIn);
    }

    #[test]
    fn only_open_reservations_can_be_cancelled_or_no_showed() {
        for status in [Pending, Confirmed] {
            assert_eq!(status.apply(A::Cancel).unwrap(), Cancelled);
            assert_eq!(status.apply(A::NoShow).unwrap(), NoShow);
        }
        for status in [CheckIn, CheckOut, Cancelled, NoShow] {
            assert!(status.apply(A::Cancel).is_err());
            assert!(status.apply(A::NoShow).is_err());
        }
    }

    #[test]
    fn terminal_states_reject_every_action() {
        for status in [CheckOut, Cancelled, NoShow] {
            assert!(status.is_terminal());
            for action in [A::Confirm, A::CheckIn, A::CheckOut, A::Cancel, A::NoShow, A::Amend] {
                assert!(status.apply(action).is_err(), "{status} accepted {action:?}");
            }
        }
    }

    #[test]
    fn checkout_requires_check_in() {
        let err = Confirmed.apply(A::CheckOut).unwrap_err();
        match err {
            AppError::InvalidTransition { from, action } => {
                assert_eq!(from, "Confirmed");
                assert_eq!(action, "check out");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn in_house_stays_cannot_be_amended() {
        assert!(CheckIn.apply(A::Amend).is_err());
        assert_eq!(Confirmed.apply(A::Amend).unwrap(), Confirmed);
    }

    #[test]
    fn charges_are_refused_on_dead_reservations() {
        assert!(CheckIn.accepts_charges());
        assert!(CheckOut.accepts_charges());
        assert!(!Cancelled.accepts_charges());
        assert!(!NoShow.accepts_charges());
    }

    #[test]
    fn discount_reads_tagged_json() {
        let d: Discount = serde_json::from_str(r#"{"type":"percent","value":10}"#).unwrap();
        assert_eq!(d, Discount::Percent(Decimal::new(10, 0)));
        let d: Discount = serde_json::from_str(r#"{"type":"amount","value":"150.50"}"#).unwrap();
        assert_eq!(d, Discount::Amount(Decimal::new(15050, 2)));
    }
}
