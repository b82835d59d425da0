use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lifecycle::Lifecycle;

text_enum!(
    /// Commercial state of a room.
    RoomStatus {
        Available => "Available",
        Reserved => "Reserved",
        Occupied => "Occupied",
        Cleaning => "Cleaning",
        Maintenance => "Maintenance",
        OutOfService => "OutOfService",
    }
);

text_enum!(
    CleaningStatus {
        Clean => "Clean",
        Dirty => "Dirty",
        InProgress => "InProgress",
        Inspection => "Inspection",
    }
);

text_enum!(
    RoomMaintenance {
        Ok => "Ok",
        Pending => "Pending",
        InProgress => "InProgress",
        OutOfService => "OutOfService",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomType {
    pub id: Uuid,
    pub property_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub base_occupancy: i32,
    pub max_occupancy: i32,
    pub base_rate: Decimal,
    pub extra_person_rate: Decimal,
    pub amenities: serde_json::Value,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub property_id: Uuid,
    pub room_type_id: Uuid,
    pub number: String,
    pub floor: i32,
    pub status: String,
    pub cleaning_status: String,
    pub maintenance_status: String,
    pub notes: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTypeRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub base_occupancy: Option<i32>,
    pub max_occupancy: Option<i32>,
    pub base_rate: Decimal,
    pub extra_person_rate: Option<Decimal>,
    pub amenities: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_type_id: Uuid,
    pub number: String,
    pub floor: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub room_type_id: Option<Uuid>,
    pub number: Option<String>,
    pub floor: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatusRequest {
    pub status: Option<RoomStatus>,
    pub cleaning_status: Option<CleaningStatus>,
    pub maintenance_status: Option<RoomMaintenance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    pub status: Option<RoomStatus>,
    pub cleaning_status: Option<CleaningStatus>,
    pub maintenance_status: Option<RoomMaintenance>,
    pub room_type_id: Option<Uuid>,
    pub floor: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub room_type_id: Option<Uuid>,
}
