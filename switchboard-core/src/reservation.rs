//! Reservations: offers of a task to a specific worker.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

status_enum! {
    /// Status of a reservation. Read-only from this backend's perspective.
    pub enum ReservationStatus: "reservation status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Timeout => "timeout",
        Canceled => "canceled" | "cancelled",
        Rescinded => "rescinded",
        Wrapping => "wrapping",
        Completed => "completed",
    }
}

/// An offer of a task to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub sid: String,
    pub task_sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_sid: Option<String>,
    pub reservation_status: ReservationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub date_created: Option<Timestamp>,
}

/// Task SIDs referenced by `reservations`, first appearance wins.
pub fn distinct_task_sids(reservations: &[Reservation]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    reservations
        .iter()
        .filter(|reservation| seen.insert(reservation.task_sid.as_str()))
        .map(|reservation| reservation.task_sid.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(sid: &str, task_sid: &str) -> Reservation {
        Reservation {
            sid: sid.to_string(),
            task_sid: task_sid.to_string(),
            worker_sid: Some("WK1".to_string()),
            reservation_status: ReservationStatus::Accepted,
            date_created: None,
        }
    }

    #[test]
    fn test_distinct_task_sids_keeps_first_appearance_order() {
        let reservations = vec![
            reservation("WR1", "WT2"),
            reservation("WR2", "WT1"),
            reservation("WR3", "WT2"),
            reservation("WR4", "WT3"),
        ];
        assert_eq!(distinct_task_sids(&reservations), vec!["WT2", "WT1", "WT3"]);
    }

    #[test]
    fn test_reservation_status_parse() {
        assert_eq!(ReservationStatus::parse("TIMEOUT"), Ok(ReservationStatus::Timeout));
        assert!(ReservationStatus::parse("expired").is_err());
    }
}
