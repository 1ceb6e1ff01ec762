//! Persisted record shapes.
//!
//! Prices are integer minor currency units and durations are integer seconds
//! everywhere in this module; formatted views are built by the domain layer.

use chrono::{DateTime, Utc};

use crate::{
    BrandId, CarModelId, CustomerVehicleId, OrderId, OrderStatus, Role, ServiceId, UserId,
};

/// A stored order together with its attached services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub status: OrderStatus,
    pub start_time: DateTime<Utc>,
    /// Projected completion time; `None` only for rows written before any
    /// service total was computed.
    pub end_time: Option<DateTime<Utc>>,
    pub customer_vehicle_id: CustomerVehicleId,
    pub employee_id: UserId,
    pub administrator_id: UserId,
    /// Attached services in attachment order.
    pub service_ids: Vec<ServiceId>,
    /// Incremented by every mutation of the order row.
    pub version: i64,
}

impl OrderRecord {
    /// Returns true if the service is attached to this order.
    pub fn has_service(&self, service_id: ServiceId) -> bool {
        self.service_ids.contains(&service_id)
    }

    /// Returns true if the order is still in progress and its end time lies
    /// strictly before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.can_complete() && self.end_time.is_some_and(|end| now > end)
    }
}

/// An order to insert together with its initial association rows.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub customer_vehicle_id: CustomerVehicleId,
    pub employee_id: UserId,
    pub administrator_id: UserId,
    pub service_ids: Vec<ServiceId>,
}

/// A batch of services to attach to an existing order.
///
/// The batch is written only if the order is still at `expected_version` and
/// in progress; `end_time` replaces the stored value in the same transaction.
#[derive(Debug, Clone)]
pub struct ServiceAttachment {
    pub order_id: OrderId,
    pub service_ids: Vec<ServiceId>,
    pub end_time: DateTime<Utc>,
    pub expected_version: i64,
}

/// A conditional status change.
///
/// Applied only if the order is still in `from` and its end time lies
/// strictly before `due_before` at commit time.
#[derive(Debug, Clone, Copy)]
pub struct StatusTransition {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub due_before: DateTime<Utc>,
}

impl StatusTransition {
    /// Completes an in-progress order whose end time passed before `now`.
    pub fn complete_if_due(order_id: OrderId, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            from: OrderStatus::InProgress,
            to: OrderStatus::Completed,
            due_before: now,
        }
    }
}

/// A billable service in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub id: ServiceId,
    pub name: String,
    pub price_minor_units: i64,
    pub duration_seconds: i64,
}

/// A service to insert into the catalog.
#[derive(Debug, Clone)]
pub struct NewService {
    pub id: ServiceId,
    pub name: String,
    pub price_minor_units: i64,
    pub duration_seconds: i64,
}

/// Explicit set of service fields that may be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub price_minor_units: Option<i64>,
    pub duration_seconds: Option<i64>,
}

impl ServicePatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the new price in minor units.
    pub fn price_minor_units(mut self, price: i64) -> Self {
        self.price_minor_units = Some(price);
        self
    }

    /// Sets the new duration in seconds.
    pub fn duration_seconds(mut self, seconds: i64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price_minor_units.is_none() && self.duration_seconds.is_none()
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, record: &mut ServiceRecord) {
        if let Some(ref name) = self.name {
            record.name = name.clone();
        }
        if let Some(price) = self.price_minor_units {
            record.price_minor_units = price;
        }
        if let Some(seconds) = self.duration_seconds {
            record.duration_seconds = seconds;
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub role: Role,
    pub notify_on_completion: bool,
}

impl UserRecord {
    /// Returns `"<first> <last> <patronymic>"`.
    pub fn full_name(&self) -> String {
        format!("{} {} {}", self.first_name, self.last_name, self.patronymic)
    }
}

/// A user to insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub role: Role,
    pub notify_on_completion: bool,
}

/// A car brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandRecord {
    pub id: BrandId,
    pub name: String,
}

/// A brand to insert.
#[derive(Debug, Clone)]
pub struct NewBrand {
    pub id: BrandId,
    pub name: String,
}

/// Explicit set of brand fields that may be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandPatch {
    pub name: Option<String>,
}

impl BrandPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, record: &mut BrandRecord) {
        if let Some(ref name) = self.name {
            record.name = name.clone();
        }
    }
}

/// A car model belonging to a brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarModelRecord {
    pub id: CarModelId,
    pub model: String,
    pub brand_id: BrandId,
}

/// A car model to insert.
#[derive(Debug, Clone)]
pub struct NewCarModel {
    pub id: CarModelId,
    pub model: String,
    pub brand_id: BrandId,
}

/// Explicit set of car model fields that may be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarModelPatch {
    pub model: Option<String>,
    pub brand_id: Option<BrandId>,
}

impl CarModelPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.brand_id.is_none()
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, record: &mut CarModelRecord) {
        if let Some(ref model) = self.model {
            record.model = model.clone();
        }
        if let Some(brand_id) = self.brand_id {
            record.brand_id = brand_id;
        }
    }
}

/// A vehicle registered by a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerVehicleRecord {
    pub id: CustomerVehicleId,
    pub car_model_id: CarModelId,
    pub owner_id: UserId,
    pub year: i32,
    pub number: String,
}

/// A customer vehicle to insert.
#[derive(Debug, Clone)]
pub struct NewCustomerVehicle {
    pub id: CustomerVehicleId,
    pub car_model_id: CarModelId,
    pub owner_id: UserId,
    pub year: i32,
    pub number: String,
}

/// Explicit set of customer vehicle fields that may be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerVehiclePatch {
    pub car_model_id: Option<CarModelId>,
    pub owner_id: Option<UserId>,
    pub year: Option<i32>,
    pub number: Option<String>,
}

impl CustomerVehiclePatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.car_model_id.is_none()
            && self.owner_id.is_none()
            && self.year.is_none()
            && self.number.is_none()
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, record: &mut CustomerVehicleRecord) {
        if let Some(car_model_id) = self.car_model_id {
            record.car_model_id = car_model_id;
        }
        if let Some(owner_id) = self.owner_id {
            record.owner_id = owner_id;
        }
        if let Some(year) = self.year {
            record.year = year;
        }
        if let Some(ref number) = self.number {
            record.number = number.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order_ending_at(end_time: Option<DateTime<Utc>>, status: OrderStatus) -> OrderRecord {
        OrderRecord {
            id: OrderId::new(),
            status,
            start_time: Utc::now(),
            end_time,
            customer_vehicle_id: CustomerVehicleId::new(),
            employee_id: UserId::new(),
            administrator_id: UserId::new(),
            service_ids: vec![],
            version: 1,
        }
    }

    #[test]
    fn order_is_due_only_strictly_after_end_time() {
        let now = Utc::now();
        let order = order_ending_at(Some(now), OrderStatus::InProgress);
        assert!(!order.is_due(now));
        assert!(order.is_due(now + Duration::seconds(1)));
    }

    #[test]
    fn completed_or_open_ended_orders_are_never_due() {
        let now = Utc::now();
        let completed = order_ending_at(Some(now - Duration::hours(1)), OrderStatus::Completed);
        assert!(!completed.is_due(now));

        let open = order_ending_at(None, OrderStatus::InProgress);
        assert!(!open.is_due(now));
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut record = ServiceRecord {
            id: ServiceId::new(),
            name: "Wash".to_string(),
            price_minor_units: 50_000,
            duration_seconds: 600,
        };

        let patch = ServicePatch::new().price_minor_units(60_000);
        assert!(!patch.is_empty());
        patch.apply_to(&mut record);

        assert_eq!(record.name, "Wash");
        assert_eq!(record.price_minor_units, 60_000);
        assert_eq!(record.duration_seconds, 600);
        assert!(ServicePatch::new().is_empty());
    }

    #[test]
    fn vehicle_patch_keeps_unset_fields() {
        let mut record = CustomerVehicleRecord {
            id: CustomerVehicleId::new(),
            car_model_id: CarModelId::new(),
            owner_id: UserId::new(),
            year: 2015,
            number: "A123BC".to_string(),
        };
        let owner_id = record.owner_id;

        let patch = CustomerVehiclePatch {
            year: Some(2018),
            number: Some("B456CD".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut record);

        assert_eq!(record.owner_id, owner_id);
        assert_eq!(record.year, 2018);
        assert_eq!(record.number, "B456CD");
        assert!(CustomerVehiclePatch::default().is_empty());
    }

    #[test]
    fn full_name_joins_three_parts() {
        let user = UserRecord {
            id: UserId::new(),
            email: "ivan@example.com".to_string(),
            first_name: "Ivan".to_string(),
            last_name: "Petrov".to_string(),
            patronymic: "Sergeevich".to_string(),
            role: Role::Customer,
            notify_on_completion: true,
        };
        assert_eq!(user.full_name(), "Ivan Petrov Sergeevich");
    }
}
