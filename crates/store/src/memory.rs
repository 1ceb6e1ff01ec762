use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    BrandId, BrandPatch, BrandRecord, CarModelId, CarModelPatch, CarModelRecord,
    CustomerVehicleId, CustomerVehiclePatch, CustomerVehicleRecord, NewBrand, NewCarModel,
    NewCustomerVehicle, NewOrder, NewService, NewUser, OrderId, OrderQuery, OrderRecord,
    OrderStatus, Result, ServiceAttachment, ServiceId, ServicePatch, ServiceRecord,
    StatusTransition, StoreError, UserId, UserRecord,
    store::{
        CatalogStore, OrderRepository, validate_attachment, validate_new_order,
        validate_service_amounts,
    },
};

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<OrderId, OrderRecord>,
    services: HashMap<ServiceId, ServiceRecord>,
    users: HashMap<UserId, UserRecord>,
    brands: HashMap<BrandId, BrandRecord>,
    car_models: HashMap<CarModelId, CarModelRecord>,
    vehicles: HashMap<CustomerVehicleId, CustomerVehicleRecord>,
}

/// In-memory store implementation for testing and database-less runs.
///
/// All tables sit behind a single lock, so every operation observes and
/// writes a consistent snapshot, matching the transactional guarantees of
/// the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Clears all orders, keeping the catalog.
    pub async fn clear_orders(&self) {
        self.tables.write().await.orders.clear();
    }
}

/// Slices a sorted table into one page and its total size.
fn paginate<T>(rows: Vec<T>, offset: usize, limit: usize) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let page = rows.into_iter().skip(offset).take(limit).collect();
    (page, total)
}

fn in_use(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::ReferenceInUse {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRecord> {
        validate_new_order(&order)?;

        let mut tables = self.tables.write().await;

        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::AlreadyExists {
                entity: "order",
                key: order.id.to_string(),
            });
        }
        if !tables.vehicles.contains_key(&order.customer_vehicle_id) {
            return Err(StoreError::missing_reference(
                "customer vehicle",
                order.customer_vehicle_id,
            ));
        }
        for user_id in [order.employee_id, order.administrator_id] {
            if !tables.users.contains_key(&user_id) {
                return Err(StoreError::missing_reference("user", user_id));
            }
        }
        if let Some(missing) = order
            .service_ids
            .iter()
            .find(|id| !tables.services.contains_key(id))
        {
            return Err(StoreError::missing_reference("service", missing));
        }

        let record = OrderRecord {
            id: order.id,
            status: OrderStatus::InProgress,
            start_time: order.start_time,
            end_time: Some(order.end_time),
            customer_vehicle_id: order.customer_vehicle_id,
            employee_id: order.employee_id,
            administrator_id: order.administrator_id,
            service_ids: order.service_ids,
            version: 1,
        };
        tables.orders.insert(record.id, record.clone());

        Ok(record)
    }

    async fn insert_associations(&self, attachment: ServiceAttachment) -> Result<i64> {
        validate_attachment(&attachment)?;

        let mut tables = self.tables.write().await;

        if let Some(missing) = attachment
            .service_ids
            .iter()
            .find(|id| !tables.services.contains_key(id))
        {
            return Err(StoreError::missing_reference("service", missing));
        }

        let order = tables
            .orders
            .get_mut(&attachment.order_id)
            .ok_or_else(|| StoreError::not_found("order", attachment.order_id))?;

        if order.version != attachment.expected_version {
            return Err(StoreError::ConcurrencyConflict {
                order_id: order.id,
                expected: attachment.expected_version,
                actual: order.version,
            });
        }
        if !order.status.can_add_services() {
            return Err(StoreError::InvalidInput(format!(
                "order {} is {}",
                order.id, order.status
            )));
        }
        if let Some(&service_id) = attachment
            .service_ids
            .iter()
            .find(|id| order.has_service(**id))
        {
            return Err(StoreError::DuplicateAssociation {
                order_id: order.id,
                service_id,
            });
        }

        order.service_ids.extend(attachment.service_ids);
        order.end_time = Some(attachment.end_time);
        order.version += 1;

        Ok(order.version)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<(Vec<OrderRecord>, u64)> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| {
                if let Some(employee) = query.employee_id
                    && o.employee_id != employee
                {
                    return false;
                }
                if let Some(customer) = query.customer_id {
                    let owned = tables
                        .vehicles
                        .get(&o.customer_vehicle_id)
                        .is_some_and(|v| v.owner_id == customer);
                    if !owned {
                        return false;
                    }
                }
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                query.matches_start_time(o.start_time)
            })
            .cloned()
            .collect();

        // Sort by start time then id
        orders.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        let total = orders.len() as u64;

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let orders: Vec<_> = orders.into_iter().skip(offset).collect();
        let orders = if let Some(limit) = query.limit {
            orders.into_iter().take(limit).collect()
        } else {
            orders
        };

        Ok((orders, total))
    }

    async fn update_order_status(
        &self,
        transition: StatusTransition,
    ) -> Result<Option<OrderRecord>> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(&transition.order_id) else {
            return Ok(None);
        };

        let due = order
            .end_time
            .is_some_and(|end| end < transition.due_before);
        if order.status != transition.from || !due {
            return Ok(None);
        }

        order.status = transition.to;
        order.version += 1;

        Ok(Some(order.clone()))
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.orders.remove(&order_id).is_some())
    }
}

#[async_trait]
impl CatalogStore for InMemoryOrderStore {
    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord> {
        validate_service_amounts(
            Some(service.price_minor_units),
            Some(service.duration_seconds),
        )?;

        let mut tables = self.tables.write().await;
        if tables.services.contains_key(&service.id) {
            return Err(StoreError::AlreadyExists {
                entity: "service",
                key: service.id.to_string(),
            });
        }

        let record = ServiceRecord {
            id: service.id,
            name: service.name,
            price_minor_units: service.price_minor_units,
            duration_seconds: service.duration_seconds,
        };
        tables.services.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_service(&self, service_id: ServiceId) -> Result<Option<ServiceRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.services.get(&service_id).cloned())
    }

    async fn get_services(&self, service_ids: &[ServiceId]) -> Result<Vec<ServiceRecord>> {
        let tables = self.tables.read().await;
        Ok(service_ids
            .iter()
            .filter_map(|id| tables.services.get(id).cloned())
            .collect())
    }

    async fn list_services(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<ServiceRecord>, u64)> {
        let tables = self.tables.read().await;
        let mut services: Vec<_> = tables.services.values().cloned().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(services, offset, limit))
    }

    async fn update_service(
        &self,
        service_id: ServiceId,
        patch: ServicePatch,
    ) -> Result<ServiceRecord> {
        validate_service_amounts(patch.price_minor_units, patch.duration_seconds)?;

        let mut tables = self.tables.write().await;
        let record = tables
            .services
            .get_mut(&service_id)
            .ok_or_else(|| StoreError::not_found("service", service_id))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_service(&self, service_id: ServiceId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.services.contains_key(&service_id) {
            return Err(StoreError::not_found("service", service_id));
        }
        if tables.orders.values().any(|o| o.has_service(service_id)) {
            return Err(in_use("service", service_id));
        }
        tables.services.remove(&service_id);
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists {
                entity: "user",
                key: user.id.to_string(),
            });
        }

        let record = UserRecord {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            patronymic: user.patronymic,
            role: user.role,
            notify_on_completion: user.notify_on_completion,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn insert_brand(&self, brand: NewBrand) -> Result<BrandRecord> {
        let mut tables = self.tables.write().await;
        if tables.brands.values().any(|b| b.name == brand.name) {
            return Err(StoreError::AlreadyExists {
                entity: "brand",
                key: brand.name,
            });
        }

        let record = BrandRecord {
            id: brand.id,
            name: brand.name,
        };
        tables.brands.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_brand(&self, brand_id: BrandId) -> Result<Option<BrandRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.brands.get(&brand_id).cloned())
    }

    async fn insert_car_model(&self, car_model: NewCarModel) -> Result<CarModelRecord> {
        let mut tables = self.tables.write().await;
        if !tables.brands.contains_key(&car_model.brand_id) {
            return Err(StoreError::missing_reference("brand", car_model.brand_id));
        }
        if tables.car_models.values().any(|m| m.model == car_model.model) {
            return Err(StoreError::AlreadyExists {
                entity: "car model",
                key: car_model.model,
            });
        }

        let record = CarModelRecord {
            id: car_model.id,
            model: car_model.model,
            brand_id: car_model.brand_id,
        };
        tables.car_models.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_car_model(&self, car_model_id: CarModelId) -> Result<Option<CarModelRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.car_models.get(&car_model_id).cloned())
    }

    async fn insert_customer_vehicle(
        &self,
        vehicle: NewCustomerVehicle,
    ) -> Result<CustomerVehicleRecord> {
        let mut tables = self.tables.write().await;
        if !tables.car_models.contains_key(&vehicle.car_model_id) {
            return Err(StoreError::missing_reference(
                "car model",
                vehicle.car_model_id,
            ));
        }
        if !tables.users.contains_key(&vehicle.owner_id) {
            return Err(StoreError::missing_reference("user", vehicle.owner_id));
        }

        let record = CustomerVehicleRecord {
            id: vehicle.id,
            car_model_id: vehicle.car_model_id,
            owner_id: vehicle.owner_id,
            year: vehicle.year,
            number: vehicle.number,
        };
        tables.vehicles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
    ) -> Result<Option<CustomerVehicleRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.vehicles.get(&vehicle_id).cloned())
    }

    async fn list_users(&self, offset: usize, limit: usize) -> Result<(Vec<UserRecord>, u64)> {
        let tables = self.tables.read().await;
        let mut users: Vec<_> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email).then(a.id.cmp(&b.id)));
        Ok(paginate(users, offset, limit))
    }

    async fn delete_user(&self, user_id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        let staffs_order = tables
            .orders
            .values()
            .any(|o| o.employee_id == user_id || o.administrator_id == user_id);
        let owns_vehicle = tables.vehicles.values().any(|v| v.owner_id == user_id);
        if staffs_order || owns_vehicle {
            return Err(in_use("user", user_id));
        }
        tables.users.remove(&user_id);
        Ok(())
    }

    async fn list_brands(&self, offset: usize, limit: usize) -> Result<(Vec<BrandRecord>, u64)> {
        let tables = self.tables.read().await;
        let mut brands: Vec<_> = tables.brands.values().cloned().collect();
        brands.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(brands, offset, limit))
    }

    async fn get_brand_by_name(&self, name: &str) -> Result<Option<BrandRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.brands.values().find(|b| b.name == name).cloned())
    }

    async fn update_brand(&self, brand_id: BrandId, patch: BrandPatch) -> Result<BrandRecord> {
        let mut tables = self.tables.write().await;
        if let Some(ref name) = patch.name
            && tables
                .brands
                .values()
                .any(|b| b.id != brand_id && &b.name == name)
        {
            return Err(StoreError::AlreadyExists {
                entity: "brand",
                key: name.clone(),
            });
        }

        let record = tables
            .brands
            .get_mut(&brand_id)
            .ok_or_else(|| StoreError::not_found("brand", brand_id))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_brand(&self, brand_id: BrandId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.brands.contains_key(&brand_id) {
            return Err(StoreError::not_found("brand", brand_id));
        }
        if tables.car_models.values().any(|m| m.brand_id == brand_id) {
            return Err(in_use("brand", brand_id));
        }
        tables.brands.remove(&brand_id);
        Ok(())
    }

    async fn list_car_models(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<CarModelRecord>, u64)> {
        let tables = self.tables.read().await;
        let mut models: Vec<_> = tables.car_models.values().cloned().collect();
        models.sort_by(|a, b| a.model.cmp(&b.model).then(a.id.cmp(&b.id)));
        Ok(paginate(models, offset, limit))
    }

    async fn update_car_model(
        &self,
        car_model_id: CarModelId,
        patch: CarModelPatch,
    ) -> Result<CarModelRecord> {
        let mut tables = self.tables.write().await;
        if !tables.car_models.contains_key(&car_model_id) {
            return Err(StoreError::not_found("car model", car_model_id));
        }
        if let Some(brand_id) = patch.brand_id
            && !tables.brands.contains_key(&brand_id)
        {
            return Err(StoreError::missing_reference("brand", brand_id));
        }
        if let Some(ref model) = patch.model
            && tables
                .car_models
                .values()
                .any(|m| m.id != car_model_id && &m.model == model)
        {
            return Err(StoreError::AlreadyExists {
                entity: "car model",
                key: model.clone(),
            });
        }

        let record = tables
            .car_models
            .get_mut(&car_model_id)
            .ok_or_else(|| StoreError::not_found("car model", car_model_id))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_car_model(&self, car_model_id: CarModelId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.car_models.contains_key(&car_model_id) {
            return Err(StoreError::not_found("car model", car_model_id));
        }
        if tables
            .vehicles
            .values()
            .any(|v| v.car_model_id == car_model_id)
        {
            return Err(in_use("car model", car_model_id));
        }
        tables.car_models.remove(&car_model_id);
        Ok(())
    }

    async fn list_customer_vehicles(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<CustomerVehicleRecord>, u64)> {
        let tables = self.tables.read().await;
        let mut vehicles: Vec<_> = tables.vehicles.values().cloned().collect();
        vehicles.sort_by(|a, b| a.number.cmp(&b.number).then(a.id.cmp(&b.id)));
        Ok(paginate(vehicles, offset, limit))
    }

    async fn update_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
        patch: CustomerVehiclePatch,
    ) -> Result<CustomerVehicleRecord> {
        let mut tables = self.tables.write().await;
        if !tables.vehicles.contains_key(&vehicle_id) {
            return Err(StoreError::not_found("customer vehicle", vehicle_id));
        }
        if let Some(car_model_id) = patch.car_model_id
            && !tables.car_models.contains_key(&car_model_id)
        {
            return Err(StoreError::missing_reference("car model", car_model_id));
        }
        if let Some(owner_id) = patch.owner_id
            && !tables.users.contains_key(&owner_id)
        {
            return Err(StoreError::missing_reference("user", owner_id));
        }

        let record = tables
            .vehicles
            .get_mut(&vehicle_id)
            .ok_or_else(|| StoreError::not_found("customer vehicle", vehicle_id))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_customer_vehicle(&self, vehicle_id: CustomerVehicleId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.vehicles.contains_key(&vehicle_id) {
            return Err(StoreError::not_found("customer vehicle", vehicle_id));
        }
        if tables
            .orders
            .values()
            .any(|o| o.customer_vehicle_id == vehicle_id)
        {
            return Err(in_use("customer vehicle", vehicle_id));
        }
        tables.vehicles.remove(&vehicle_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::{DateTime, Duration, Utc};

    struct Fixture {
        store: InMemoryOrderStore,
        vehicle: CustomerVehicleId,
        owner: UserId,
        staff: UserId,
        wash: ServiceId,
        wax: ServiceId,
    }

    async fn user(store: &InMemoryOrderStore, role: Role) -> UserId {
        store
            .insert_user(NewUser {
                id: UserId::new(),
                email: format!("{role}@example.com"),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                patronymic: String::new(),
                role,
                notify_on_completion: false,
            })
            .await
            .unwrap()
            .id
    }

    async fn service(store: &InMemoryOrderStore, name: &str, price: i64, secs: i64) -> ServiceId {
        store
            .insert_service(NewService {
                id: ServiceId::new(),
                name: name.to_string(),
                price_minor_units: price,
                duration_seconds: secs,
            })
            .await
            .unwrap()
            .id
    }

    async fn fixture() -> Fixture {
        let store = InMemoryOrderStore::new();
        let owner = user(&store, Role::Customer).await;
        let staff = user(&store, Role::Employee).await;
        let brand = store
            .insert_brand(NewBrand {
                id: BrandId::new(),
                name: "Lada".to_string(),
            })
            .await
            .unwrap();
        let model = store
            .insert_car_model(NewCarModel {
                id: CarModelId::new(),
                model: "Vesta".to_string(),
                brand_id: brand.id,
            })
            .await
            .unwrap();
        let vehicle = store
            .insert_customer_vehicle(NewCustomerVehicle {
                id: CustomerVehicleId::new(),
                car_model_id: model.id,
                owner_id: owner,
                year: 2020,
                number: "A123BC".to_string(),
            })
            .await
            .unwrap()
            .id;
        let wash = service(&store, "Wash", 50_000, 600).await;
        let wax = service(&store, "Wax", 20_000, 300).await;

        Fixture {
            store,
            vehicle,
            owner,
            staff,
            wash,
            wax,
        }
    }

    fn new_order(f: &Fixture, start: DateTime<Utc>, services: Vec<ServiceId>) -> NewOrder {
        NewOrder {
            id: OrderId::new(),
            start_time: start,
            end_time: start + Duration::minutes(10),
            customer_vehicle_id: f.vehicle,
            employee_id: f.staff,
            administrator_id: f.staff,
            service_ids: services,
        }
    }

    #[tokio::test]
    async fn insert_and_get_order() {
        let f = fixture().await;
        let order = f
            .store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.version, 1);

        let loaded = f.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
        assert_eq!(f.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn insert_order_with_unknown_service_writes_nothing() {
        let f = fixture().await;
        let result = f
            .store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash, ServiceId::new()]))
            .await;

        assert!(matches!(result, Err(StoreError::MissingReference { .. })));
        assert_eq!(f.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn attach_services_bumps_version() {
        let f = fixture().await;
        let order = f
            .store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash]))
            .await
            .unwrap();
        let new_end = order.end_time.unwrap() + Duration::seconds(300);

        let version = f
            .store
            .insert_associations(ServiceAttachment {
                order_id: order.id,
                service_ids: vec![f.wax],
                end_time: new_end,
                expected_version: 1,
            })
            .await
            .unwrap();

        assert_eq!(version, 2);
        let loaded = f.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.service_ids, vec![f.wash, f.wax]);
        assert_eq!(loaded.end_time, Some(new_end));
    }

    #[tokio::test]
    async fn attach_with_stale_version_conflicts() {
        let f = fixture().await;
        let order = f
            .store
            .insert_order(new_order(&f, Utc::now(), vec![]))
            .await
            .unwrap();

        let result = f
            .store
            .insert_associations(ServiceAttachment {
                order_id: order.id,
                service_ids: vec![f.wax],
                end_time: Utc::now(),
                expected_version: 7,
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict {
                expected: 7,
                actual: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn attach_duplicate_leaves_order_unchanged() {
        let f = fixture().await;
        let order = f
            .store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash]))
            .await
            .unwrap();

        let result = f
            .store
            .insert_associations(ServiceAttachment {
                order_id: order.id,
                service_ids: vec![f.wax, f.wash],
                end_time: Utc::now() + Duration::hours(1),
                expected_version: 1,
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::DuplicateAssociation { service_id, .. }) if service_id == f.wash
        ));
        let loaded = f.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn status_transition_is_conditional() {
        let f = fixture().await;
        let start = Utc::now() - Duration::hours(1);
        let order = f
            .store
            .insert_order(new_order(&f, start, vec![f.wash]))
            .await
            .unwrap();

        // Not yet due relative to a time before the end
        let early = f
            .store
            .update_order_status(StatusTransition::complete_if_due(order.id, start))
            .await
            .unwrap();
        assert!(early.is_none());

        let now = Utc::now();
        let completed = f
            .store
            .update_order_status(StatusTransition::complete_if_due(order.id, now))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(completed.version, 2);

        // Second application is a no-op
        let again = f
            .store
            .update_order_status(StatusTransition::complete_if_due(order.id, now))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn list_orders_filters_and_counts_before_paging() {
        let f = fixture().await;
        let base = Utc::now();
        for i in 0..5 {
            f.store
                .insert_order(new_order(&f, base + Duration::minutes(i), vec![]))
                .await
                .unwrap();
        }

        let (page, total) = f
            .store
            .list_orders(OrderQuery::new().offset(1).limit(2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].start_time, base + Duration::minutes(1));

        let (mine, total) = f
            .store
            .list_orders(OrderQuery::new().customer_id(f.owner))
            .await
            .unwrap();
        assert_eq!((mine.len(), total), (5, 5));

        let (theirs, total) = f
            .store
            .list_orders(OrderQuery::new().customer_id(UserId::new()))
            .await
            .unwrap();
        assert!(theirs.is_empty());
        assert_eq!(total, 0);

        let (completed, _) = f
            .store
            .list_orders(OrderQuery::new().status(OrderStatus::Completed))
            .await
            .unwrap();
        assert!(completed.is_empty());
    }

    #[tokio::test]
    async fn delete_order_reports_absence() {
        let f = fixture().await;
        let order = f
            .store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash]))
            .await
            .unwrap();

        assert!(f.store.delete_order(order.id).await.unwrap());
        assert!(!f.store.delete_order(order.id).await.unwrap());
        assert!(f.store.get_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attached_service_cannot_be_deleted() {
        let f = fixture().await;
        f.store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash]))
            .await
            .unwrap();

        let result = f.store.delete_service(f.wash).await;
        assert!(matches!(result, Err(StoreError::ReferenceInUse { .. })));

        f.store.delete_service(f.wax).await.unwrap();
        assert!(f.store.get_service(f.wax).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_service_applies_patch() {
        let f = fixture().await;
        let updated = f
            .store
            .update_service(f.wax, ServicePatch::new().name("Hot wax"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Hot wax");
        assert_eq!(updated.price_minor_units, 20_000);

        let result = f
            .store
            .update_service(f.wax, ServicePatch::new().duration_seconds(-1))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn get_services_skips_unknown_ids() {
        let f = fixture().await;
        let found = f
            .store
            .get_services(&[f.wax, ServiceId::new(), f.wash])
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![f.wax, f.wash]);
    }

    #[tokio::test]
    async fn brand_names_are_unique() {
        let f = fixture().await;
        let result = f
            .store
            .insert_brand(NewBrand {
                id: BrandId::new(),
                name: "Lada".to_string(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn brand_rename_and_delete_respect_references() {
        let f = fixture().await;
        let lada = f.store.get_brand_by_name("Lada").await.unwrap().unwrap();
        let kia = f
            .store
            .insert_brand(NewBrand {
                id: BrandId::new(),
                name: "Kia".to_string(),
            })
            .await
            .unwrap();

        let clash = BrandPatch {
            name: Some("Lada".to_string()),
        };
        let result = f.store.update_brand(kia.id, clash).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));

        let (brands, total) = f.store.list_brands(0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(brands[0].name, "Kia");

        let result = f.store.delete_brand(lada.id).await;
        assert!(matches!(result, Err(StoreError::ReferenceInUse { .. })));

        f.store.delete_brand(kia.id).await.unwrap();
        assert!(f.store.get_brand(kia.id).await.unwrap().is_none());
        let result = f.store.delete_brand(kia.id).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn car_model_update_checks_brand() {
        let f = fixture().await;
        let (models, _) = f.store.list_car_models(0, 10).await.unwrap();
        let vesta = models[0].id;

        let patch = CarModelPatch {
            brand_id: Some(BrandId::new()),
            ..Default::default()
        };
        let result = f.store.update_car_model(vesta, patch).await;
        assert!(matches!(result, Err(StoreError::MissingReference { .. })));

        let patch = CarModelPatch {
            model: Some("Granta".to_string()),
            ..Default::default()
        };
        let updated = f.store.update_car_model(vesta, patch).await.unwrap();
        assert_eq!(updated.model, "Granta");

        let result = f.store.delete_car_model(vesta).await;
        assert!(matches!(result, Err(StoreError::ReferenceInUse { .. })));
    }

    #[tokio::test]
    async fn vehicle_and_owner_deletion_follow_references() {
        let f = fixture().await;
        f.store
            .insert_order(new_order(&f, Utc::now(), vec![f.wash]))
            .await
            .unwrap();

        let result = f.store.delete_customer_vehicle(f.vehicle).await;
        assert!(matches!(result, Err(StoreError::ReferenceInUse { .. })));
        let result = f.store.delete_user(f.owner).await;
        assert!(matches!(result, Err(StoreError::ReferenceInUse { .. })));

        let patch = CustomerVehiclePatch {
            owner_id: Some(UserId::new()),
            ..Default::default()
        };
        let result = f.store.update_customer_vehicle(f.vehicle, patch).await;
        assert!(matches!(result, Err(StoreError::MissingReference { .. })));

        f.store.clear_orders().await;
        f.store.delete_customer_vehicle(f.vehicle).await.unwrap();
        f.store.delete_user(f.owner).await.unwrap();

        let (users, total) = f.store.list_users(0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].id, f.staff);
    }
}
