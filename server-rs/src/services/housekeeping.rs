use chrono::NaiveDate;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    CleaningStatus, HousekeepingKind, HousekeepingStatus, MaintenanceTaskStatus, Priority,
    RoomMaintenance,
};

/// Cleaning status the room takes when one of its tasks reaches `status`.
pub fn cleaning_status_for(status: HousekeepingStatus) -> Option<CleaningStatus> {
    match status {
        HousekeepingStatus::Pending => None,
        HousekeepingStatus::InProgress => Some(CleaningStatus::InProgress),
        HousekeepingStatus::Completed => Some(CleaningStatus::Inspection),
        HousekeepingStatus::Verified => Some(CleaningStatus::Clean),
    }
}

/// Maintenance flag raised on a room when a task is opened against it.
pub fn maintenance_on_open(priority: Priority) -> Option<RoomMaintenance> {
    match priority {
        Priority::Urgent | Priority::High => Some(RoomMaintenance::Pending),
        Priority::Normal | Priority::Low => None,
    }
}

/// Maintenance flag after a task moves to `status`. A room only returns to
/// `Ok` once none of its other tasks is still open.
pub fn maintenance_on_status(status: MaintenanceTaskStatus, other_open_tasks: i64) -> Option<RoomMaintenance> {
    match status {
        MaintenanceTaskStatus::Pending => None,
        MaintenanceTaskStatus::InProgress => Some(RoomMaintenance::InProgress),
        MaintenanceTaskStatus::Completed | MaintenanceTaskStatus::Cancelled => {
            (other_open_tasks == 0).then_some(RoomMaintenance::Ok)
        }
    }
}

pub async fn set_cleaning_status(
    conn: &mut PgConnection,
    property_id: Uuid,
    room_id: Uuid,
    status: CleaningStatus,
) -> AppResult<()> {
    sqlx::query("UPDATE rooms SET cleaning_status = $3 WHERE id = $1 AND property_id = $2")
        .bind(room_id)
        .bind(property_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn set_maintenance_status(
    conn: &mut PgConnection,
    property_id: Uuid,
    room_id: Uuid,
    status: RoomMaintenance,
) -> AppResult<()> {
    sqlx::query("UPDATE rooms SET maintenance_status = $3 WHERE id = $1 AND property_id = $2")
        .bind(room_id)
        .bind(property_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Queues the turnover cleaning of a room just vacated.
pub async fn schedule_checkout_cleaning(
    conn: &mut PgConnection,
    property_id: Uuid,
    room_id: Uuid,
    date: NaiveDate,
    reservation_number: &str,
) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO housekeeping_tasks (id, property_id, room_id, scheduled_for, kind, priority, status, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
    )
    .bind(id)
    .bind(property_id)
    .bind(room_id)
    .bind(date)
    .bind(HousekeepingKind::Checkout.as_str())
    .bind(Priority::High.as_str())
    .bind(HousekeepingStatus::Pending.as_str())
    .bind(format!("Checkout of {reservation_number}"))
    .execute(conn)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_progress_maps_onto_the_room() {
        assert_eq!(cleaning_status_for(HousekeepingStatus::Pending), None);
        assert_eq!(
            cleaning_status_for(HousekeepingStatus::InProgress),
            Some(CleaningStatus::InProgress)
        );
        assert_eq!(
            cleaning_status_for(HousekeepingStatus::Completed),
            Some(CleaningStatus::Inspection)
        );
        assert_eq!(
            cleaning_status_for(HousekeepingStatus::Verified),
            Some(CleaningStatus::Clean)
        );
    }

    #[test]
    fn only_pressing_maintenance_flags_the_room() {
        assert_eq!(maintenance_on_open(Priority::Urgent), Some(RoomMaintenance::Pending));
        assert_eq!(maintenance_on_open(Priority::High), Some(RoomMaintenance::Pending));
        assert_eq!(maintenance_on_open(Priority::Normal), None);
        assert_eq!(maintenance_on_open(Priority::Low), None);
    }

    #[test]
    fn room_is_cleared_after_its_last_open_task() {
        assert_eq!(
            maintenance_on_status(MaintenanceTaskStatus::InProgress, 3),
            Some(RoomMaintenance::InProgress)
        );
        assert_eq!(
            maintenance_on_status(MaintenanceTaskStatus::Completed, 0),
            Some(RoomMaintenance::Ok)
        );
        assert_eq!(maintenance_on_status(MaintenanceTaskStatus::Completed, 1), None);
        assert_eq!(maintenance_on_status(MaintenanceTaskStatus::Pending, 0), None);
    }
}
