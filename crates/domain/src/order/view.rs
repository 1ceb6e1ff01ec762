//! Read-side shapes of an aggregated order.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use store::{CustomerVehicleId, OrderId, OrderStatus, ServiceId, UserId};

/// Format of every displayed timestamp.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset of displayed times from UTC, in hours.
const DISPLAY_OFFSET_HOURS: i64 = 7;

/// Renders a stored UTC instant as local wall-clock time at UTC+07:00.
pub fn format_display_time(time: DateTime<Utc>) -> String {
    (time + Duration::hours(DISPLAY_OFFSET_HOURS))
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}

/// A staff member as shown on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonView {
    pub id: UserId,
    pub full_name: String,
}

/// The vehicle owner as shown on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerView {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
}

/// Car model and brand names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarView {
    pub model: String,
    pub brand: String,
}

/// The washed vehicle with its owner and model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerVehicleView {
    pub id: CustomerVehicleId,
    pub year: i32,
    pub number: String,
    pub customer: CustomerView,
    pub car: CarView,
}

/// An order with its derived totals and display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub status: OrderStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    /// Whole minutes, rounded down.
    pub total_time: i64,
    /// Whole major currency units, rounded down.
    pub total_price: i64,
    pub service_ids: Vec<ServiceId>,
    pub administrator: PersonView,
    pub employee: PersonView,
    pub customer_vehicle: CustomerVehicleView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_time_is_shifted_to_plus_seven() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 5).unwrap();
        assert_eq!(format_display_time(time), "2024-03-02 03:30:05");
    }

    #[test]
    fn test_view_json_shape() {
        let person = PersonView {
            id: UserId::new(),
            full_name: "Ivan Petrov Sergeevich".to_string(),
        };
        let view = OrderView {
            id: OrderId::new(),
            status: OrderStatus::InProgress,
            start_time: "2024-03-02 03:30:05".to_string(),
            end_time: None,
            total_time: 15,
            total_price: 700,
            service_ids: vec![],
            administrator: person.clone(),
            employee: person,
            customer_vehicle: CustomerVehicleView {
                id: CustomerVehicleId::new(),
                year: 2020,
                number: "А123ВС77".to_string(),
                customer: CustomerView {
                    id: UserId::new(),
                    full_name: "Olga Petrova Ivanovna".to_string(),
                    email: "olga@example.com".to_string(),
                },
                car: CarView {
                    model: "Camry".to_string(),
                    brand: "Toyota".to_string(),
                },
            },
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["end_time"], serde_json::Value::Null);
        assert_eq!(json["customer_vehicle"]["car"]["brand"], "Toyota");
        assert_eq!(json["id"], view.id.to_string());
    }

    #[test]
    fn test_display_time_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let later = earlier + Duration::hours(20);
        assert!(format_display_time(earlier) < format_display_time(later));
    }
}
