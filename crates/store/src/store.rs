use async_trait::async_trait;

use crate::{
    BrandId, BrandPatch, BrandRecord, CarModelId, CarModelPatch, CarModelRecord,
    CustomerVehicleId, CustomerVehiclePatch, CustomerVehicleRecord, NewBrand, NewCarModel,
    NewCustomerVehicle, NewOrder, NewService, NewUser, OrderId, OrderQuery, OrderRecord, Result,
    ServiceAttachment, ServiceId, ServicePatch, ServiceRecord, StatusTransition, StoreError,
    UserId, UserRecord,
};

/// Persistence of orders and their service associations.
///
/// Every mutating method is atomic: either all rows it touches are written
/// or none are. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts an order and its initial association rows as one unit.
    ///
    /// The stored order starts in progress at version 1.
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRecord>;

    /// Attaches a batch of services and replaces the end time.
    ///
    /// Fails with `ConcurrencyConflict` if the order is no longer at the
    /// expected version and with `DuplicateAssociation` if any service is
    /// already attached; nothing is written in either case.
    ///
    /// Returns the new version of the order.
    async fn insert_associations(&self, attachment: ServiceAttachment) -> Result<i64>;

    /// Retrieves an order with its attached services.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Lists orders matching a query.
    ///
    /// Returns the requested page and the number of orders matching the
    /// filters before pagination.
    async fn list_orders(&self, query: OrderQuery) -> Result<(Vec<OrderRecord>, u64)>;

    /// Applies a conditional status change.
    ///
    /// Returns the updated order if the transition took effect, or None if
    /// the order is missing, no longer in `from`, or not yet due.
    async fn update_order_status(
        &self,
        transition: StatusTransition,
    ) -> Result<Option<OrderRecord>>;

    /// Deletes an order and all of its association rows.
    ///
    /// Returns false if the order doesn't exist.
    async fn delete_order(&self, order_id: OrderId) -> Result<bool>;
}

/// Lookup and maintenance of the records orders refer to.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a service.
    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord>;

    /// Retrieves a service by id.
    async fn get_service(&self, service_id: ServiceId) -> Result<Option<ServiceRecord>>;

    /// Retrieves every existing service among `service_ids`.
    ///
    /// Unknown ids are skipped; the caller compares lengths to detect them.
    async fn get_services(&self, service_ids: &[ServiceId]) -> Result<Vec<ServiceRecord>>;

    /// Lists services ordered by name, with the total catalog size.
    async fn list_services(&self, offset: usize, limit: usize)
    -> Result<(Vec<ServiceRecord>, u64)>;

    /// Applies a patch to a service and returns the updated record.
    async fn update_service(
        &self,
        service_id: ServiceId,
        patch: ServicePatch,
    ) -> Result<ServiceRecord>;

    /// Deletes a service that no order refers to.
    async fn delete_service(&self, service_id: ServiceId) -> Result<()>;

    /// Inserts a user.
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord>;

    /// Retrieves a user by id.
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    /// Inserts a brand.
    async fn insert_brand(&self, brand: NewBrand) -> Result<BrandRecord>;

    /// Retrieves a brand by id.
    async fn get_brand(&self, brand_id: BrandId) -> Result<Option<BrandRecord>>;

    /// Inserts a car model.
    async fn insert_car_model(&self, car_model: NewCarModel) -> Result<CarModelRecord>;

    /// Retrieves a car model by id.
    async fn get_car_model(&self, car_model_id: CarModelId) -> Result<Option<CarModelRecord>>;

    /// Inserts a customer vehicle.
    async fn insert_customer_vehicle(
        &self,
        vehicle: NewCustomerVehicle,
    ) -> Result<CustomerVehicleRecord>;

    /// Retrieves a customer vehicle by id.
    async fn get_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
    ) -> Result<Option<CustomerVehicleRecord>>;

    /// Lists users ordered by email, with the total count.
    async fn list_users(&self, offset: usize, limit: usize) -> Result<(Vec<UserRecord>, u64)>;

    /// Deletes a user nothing refers to.
    ///
    /// Fails with `ReferenceInUse` while orders or vehicles point at the user.
    async fn delete_user(&self, user_id: UserId) -> Result<()>;

    /// Lists brands ordered by name, with the total count.
    async fn list_brands(&self, offset: usize, limit: usize) -> Result<(Vec<BrandRecord>, u64)>;

    /// Retrieves a brand by its exact name.
    async fn get_brand_by_name(&self, name: &str) -> Result<Option<BrandRecord>>;

    /// Applies a patch to a brand and returns the updated record.
    async fn update_brand(&self, brand_id: BrandId, patch: BrandPatch) -> Result<BrandRecord>;

    /// Deletes a brand no car model belongs to.
    async fn delete_brand(&self, brand_id: BrandId) -> Result<()>;

    /// Lists car models ordered by model name, with the total count.
    async fn list_car_models(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<CarModelRecord>, u64)>;

    /// Applies a patch to a car model and returns the updated record.
    async fn update_car_model(
        &self,
        car_model_id: CarModelId,
        patch: CarModelPatch,
    ) -> Result<CarModelRecord>;

    /// Deletes a car model no vehicle refers to.
    async fn delete_car_model(&self, car_model_id: CarModelId) -> Result<()>;

    /// Lists customer vehicles ordered by plate number, with the total count.
    async fn list_customer_vehicles(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<CustomerVehicleRecord>, u64)>;

    /// Applies a patch to a customer vehicle and returns the updated record.
    async fn update_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
        patch: CustomerVehiclePatch,
    ) -> Result<CustomerVehicleRecord>;

    /// Deletes a customer vehicle no order refers to.
    async fn delete_customer_vehicle(&self, vehicle_id: CustomerVehicleId) -> Result<()>;
}

/// A backend providing both orders and the catalog.
pub trait OrderStore: OrderRepository + CatalogStore {}

// Blanket implementation for every backend providing both halves
impl<T: OrderRepository + CatalogStore + ?Sized> OrderStore for T {}

/// Validates a new order before inserting it.
pub fn validate_new_order(order: &NewOrder) -> Result<()> {
    if order.end_time < order.start_time {
        return Err(StoreError::InvalidInput(
            "order end time precedes its start time".to_string(),
        ));
    }
    if let Some(service_id) = first_repeated(&order.service_ids) {
        return Err(StoreError::DuplicateAssociation {
            order_id: order.id,
            service_id,
        });
    }
    Ok(())
}

/// Validates an attachment batch before writing it.
pub fn validate_attachment(attachment: &ServiceAttachment) -> Result<()> {
    if attachment.service_ids.is_empty() {
        return Err(StoreError::InvalidInput(
            "cannot attach an empty service batch".to_string(),
        ));
    }
    if let Some(service_id) = first_repeated(&attachment.service_ids) {
        return Err(StoreError::DuplicateAssociation {
            order_id: attachment.order_id,
            service_id,
        });
    }
    Ok(())
}

/// Validates service amounts: price and duration are non-negative.
pub fn validate_service_amounts(
    price_minor_units: Option<i64>,
    duration_seconds: Option<i64>,
) -> Result<()> {
    if let Some(price) = price_minor_units
        && price < 0
    {
        return Err(StoreError::InvalidInput(format!(
            "service price must not be negative, got {price}"
        )));
    }
    if let Some(seconds) = duration_seconds
        && seconds < 0
    {
        return Err(StoreError::InvalidInput(format!(
            "service duration must not be negative, got {seconds}"
        )));
    }
    Ok(())
}

/// Converts a page offset or limit into a SQL bigint.
pub fn page_bound(value: usize, name: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidInput(format!("{name} {value} is out of range")))
}

fn first_repeated(service_ids: &[ServiceId]) -> Option<ServiceId> {
    let mut seen = std::collections::HashSet::with_capacity(service_ids.len());
    service_ids.iter().copied().find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomerVehicleId, UserId};
    use chrono::{Duration, Utc};

    fn new_order(service_ids: Vec<ServiceId>) -> NewOrder {
        let now = Utc::now();
        NewOrder {
            id: OrderId::new(),
            start_time: now,
            end_time: now + Duration::minutes(10),
            customer_vehicle_id: CustomerVehicleId::new(),
            employee_id: UserId::new(),
            administrator_id: UserId::new(),
            service_ids,
        }
    }

    #[test]
    fn new_order_with_repeated_service_is_rejected() {
        let service = ServiceId::new();
        let result = validate_new_order(&new_order(vec![service, ServiceId::new(), service]));
        assert!(matches!(
            result,
            Err(StoreError::DuplicateAssociation { service_id, .. }) if service_id == service
        ));
    }

    #[test]
    fn new_order_ending_before_start_is_rejected() {
        let mut order = new_order(vec![]);
        order.end_time = order.start_time - Duration::seconds(1);
        assert!(matches!(
            validate_new_order(&order),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_attachment_is_rejected() {
        let attachment = ServiceAttachment {
            order_id: OrderId::new(),
            service_ids: vec![],
            end_time: Utc::now(),
            expected_version: 1,
        };
        assert!(matches!(
            validate_attachment(&attachment),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn page_bounds_beyond_bigint_are_rejected() {
        assert_eq!(page_bound(100, "limit").unwrap(), 100);
        assert_eq!(page_bound(i64::MAX as usize, "offset").unwrap(), i64::MAX);
        assert!(matches!(
            page_bound(usize::MAX, "limit"),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(validate_service_amounts(Some(0), Some(0)).is_ok());
        assert!(validate_service_amounts(None, None).is_ok());
        assert!(validate_service_amounts(Some(-1), None).is_err());
        assert!(validate_service_amounts(None, Some(-60)).is_err());
    }
}
