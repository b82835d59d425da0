use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum!(
    Priority {
        Urgent => "Urgent",
        High => "High",
        Normal => "Normal",
        Low => "Low",
    }
);

impl Priority {
    /// SQL expression ordering `column` from most to least urgent.
    pub fn order_by(column: &str) -> String {
        format!(
            "CASE {column} WHEN 'Urgent' THEN 0 WHEN 'High' THEN 1 WHEN 'Normal' THEN 2 ELSE 3 END"
        )
    }
}

text_enum!(
    HousekeepingKind {
        Checkout => "Checkout",
        Stayover => "Stayover",
        Deep => "Deep",
        Inspection => "Inspection",
    }
);

text_enum!(
    HousekeepingStatus {
        Pending => "Pending",
        InProgress => "InProgress",
        Completed => "Completed",
        Verified => "Verified",
    }
);

text_enum!(
    MaintenanceKind {
        Corrective => "Corrective",
        Preventive => "Preventive",
    }
);

text_enum!(
    MaintenanceTaskStatus {
        Pending => "Pending",
        InProgress => "InProgress",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
);

impl MaintenanceTaskStatus {
    pub fn is_open(self) -> bool {
        matches!(self, MaintenanceTaskStatus::Pending | MaintenanceTaskStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HousekeepingTask {
    pub id: Uuid,
    pub property_id: Uuid,
    pub room_id: Uuid,
    pub scheduled_for: NaiveDate,
    pub kind: String,
    pub priority: String,
    pub status: String,
    pub assignee_id: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Housekeeping task with the room label, for the daily board.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HousekeepingBoardEntry {
    pub id: Uuid,
    pub room_id: Uuid,
    pub room_number: String,
    pub floor: i32,
    pub kind: String,
    pub priority: String,
    pub status: String,
    pub assignee_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceTask {
    pub id: Uuid,
    pub property_id: Uuid,
    pub room_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub kind: String,
    pub priority: String,
    pub status: String,
    pub assignee_id: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub reported_on: NaiveDate,
    pub scheduled_for: Option<NaiveDate>,
    pub completed_on: Option<NaiveDate>,
    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHousekeepingRequest {
    pub room_id: Uuid,
    pub scheduled_for: Option<NaiveDate>,
    pub kind: Option<HousekeepingKind>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest<S> {
    pub status: S,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub assignee_id: Option<Uuid>,
    pub assignee_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousekeepingQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<HousekeepingStatus>,
    pub room_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaintenanceRequest {
    pub room_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub kind: Option<MaintenanceKind>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub scheduled_for: Option<NaiveDate>,
    pub estimated_cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceStatusRequest {
    pub status: MaintenanceTaskStatus,
    pub actual_cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceQuery {
    pub status: Option<MaintenanceTaskStatus>,
    pub priority: Option<Priority>,
    pub room_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_puts_urgent_first() {
        let sql = Priority::order_by("t.priority");
        assert!(sql.starts_with("CASE t.priority WHEN 'Urgent' THEN 0"));
    }

    #[test]
    fn only_pending_and_in_progress_maintenance_is_open() {
        assert!(MaintenanceTaskStatus::Pending.is_open());
        assert!(MaintenanceTaskStatus::InProgress.is_open());
        assert!(!MaintenanceTaskStatus::Completed.is_open());
        assert!(!MaintenanceTaskStatus::Cancelled.is_open());
    }
}
