//! Derived order fields and display data.

use store::{CatalogStore, OrderRecord, ServiceRecord, UserId, UserRecord};

use super::view::{
    CarView, CustomerVehicleView, CustomerView, OrderView, PersonView, format_display_time,
};
use super::{OrderError, total_duration, total_price};
use crate::error::Result;

/// Builds [`OrderView`]s from stored orders.
///
/// The fetch graph is fixed: one lookup per related record plus one batched
/// lookup for the attached services. A missing related record is a data
/// integrity failure and surfaces as `NotFound`.
#[derive(Clone)]
pub struct OrderAggregator<S: CatalogStore> {
    store: S,
}

impl<S: CatalogStore> OrderAggregator<S> {
    /// Creates an aggregator reading from the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Computes totals and display data for an order.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn summarize(&self, order: &OrderRecord) -> Result<OrderView> {
        let services = self.attached_services(order).await?;
        let total_time = total_duration(&services)?;
        let total_price = total_price(&services)?;

        let vehicle = self
            .store
            .get_customer_vehicle(order.customer_vehicle_id)
            .await?
            .ok_or_else(|| missing("customer vehicle", order.customer_vehicle_id))?;
        let owner = self.user(vehicle.owner_id).await?;
        let car_model = self
            .store
            .get_car_model(vehicle.car_model_id)
            .await?
            .ok_or_else(|| missing("car model", vehicle.car_model_id))?;
        let brand = self
            .store
            .get_brand(car_model.brand_id)
            .await?
            .ok_or_else(|| missing("brand", car_model.brand_id))?;
        let employee = self.user(order.employee_id).await?;
        let administrator = self.user(order.administrator_id).await?;

        Ok(OrderView {
            id: order.id,
            status: order.status,
            start_time: format_display_time(order.start_time),
            end_time: order.end_time.map(format_display_time),
            total_time: total_time.minutes(),
            total_price: total_price.major_units(),
            service_ids: order.service_ids.clone(),
            administrator: person(&administrator),
            employee: person(&employee),
            customer_vehicle: CustomerVehicleView {
                id: vehicle.id,
                year: vehicle.year,
                number: vehicle.number,
                customer: CustomerView {
                    id: owner.id,
                    full_name: owner.full_name(),
                    email: owner.email,
                },
                car: CarView {
                    model: car_model.model,
                    brand: brand.name,
                },
            },
        })
    }

    /// Summarizes a batch of orders, preserving their order.
    pub async fn summarize_all(&self, orders: &[OrderRecord]) -> Result<Vec<OrderView>> {
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(self.summarize(order).await?);
        }
        Ok(views)
    }

    async fn attached_services(&self, order: &OrderRecord) -> Result<Vec<ServiceRecord>> {
        let services = self.store.get_services(&order.service_ids).await?;
        if services.len() != order.service_ids.len()
            && let Some(id) = order
                .service_ids
                .iter()
                .find(|id| !services.iter().any(|s| s.id == **id))
        {
            return Err(missing("service", id).into());
        }
        Ok(services)
    }

    async fn user(&self, user_id: UserId) -> Result<UserRecord> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| missing("user", user_id).into())
    }
}

fn missing(entity: &'static str, id: impl ToString) -> OrderError {
    OrderError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn person(user: &UserRecord) -> PersonView {
    PersonView {
        id: user.id,
        full_name: user.full_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainError;
    use chrono::{TimeZone, Utc};
    use store::{
        BrandId, CarModelId, CustomerVehicleId, InMemoryOrderStore, NewBrand, NewCarModel,
        NewCustomerVehicle, NewService, NewUser, OrderId, OrderStatus, Role, ServiceId,
    };

    async fn user(store: &InMemoryOrderStore, first: &str, role: Role) -> UserId {
        store
            .insert_user(NewUser {
                id: UserId::new(),
                email: format!("{}@example.com", first.to_lowercase()),
                first_name: first.to_string(),
                last_name: "Kuznetsov".to_string(),
                patronymic: "Pavlovich".to_string(),
                role,
                notify_on_completion: false,
            })
            .await
            .unwrap()
            .id
    }

    async fn order_with(
        store: &InMemoryOrderStore,
        services: &[(i64, i64)],
    ) -> OrderRecord {
        let owner = user(store, "Igor", Role::Customer).await;
        let staff = user(store, "Petr", Role::Employee).await;
        let brand = store
            .insert_brand(NewBrand {
                id: BrandId::new(),
                name: "Kia".to_string(),
            })
            .await
            .unwrap();
        let model = store
            .insert_car_model(NewCarModel {
                id: CarModelId::new(),
                model: "Rio".to_string(),
                brand_id: brand.id,
            })
            .await
            .unwrap();
        let vehicle = store
            .insert_customer_vehicle(NewCustomerVehicle {
                id: CustomerVehicleId::new(),
                car_model_id: model.id,
                owner_id: owner,
                year: 2018,
                number: "E001KX".to_string(),
            })
            .await
            .unwrap();

        let mut service_ids = Vec::new();
        for (i, (price, secs)) in services.iter().enumerate() {
            let service = store
                .insert_service(NewService {
                    id: ServiceId::new(),
                    name: format!("Service {i}"),
                    price_minor_units: *price,
                    duration_seconds: *secs,
                })
                .await
                .unwrap();
            service_ids.push(service.id);
        }

        let start = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        OrderRecord {
            id: OrderId::new(),
            status: OrderStatus::InProgress,
            start_time: start,
            end_time: Some(start + chrono::Duration::minutes(15)),
            customer_vehicle_id: vehicle.id,
            employee_id: staff,
            administrator_id: staff,
            service_ids,
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_totals_round_down() {
        let store = InMemoryOrderStore::new();
        let order = order_with(&store, &[(50_000, 600), (20_099, 359)]).await;

        let view = OrderAggregator::new(store).summarize(&order).await.unwrap();

        // 959 s -> 15 min, 70099 minor -> 700 major
        assert_eq!(view.total_time, 15);
        assert_eq!(view.total_price, 700);
    }

    #[tokio::test]
    async fn test_display_data() {
        let store = InMemoryOrderStore::new();
        let order = order_with(&store, &[]).await;

        let view = OrderAggregator::new(store).summarize(&order).await.unwrap();

        assert_eq!(view.total_time, 0);
        assert_eq!(view.total_price, 0);
        assert_eq!(view.start_time, "2024-05-10 15:00:00");
        assert_eq!(view.end_time.as_deref(), Some("2024-05-10 15:15:00"));
        assert_eq!(view.employee.full_name, "Petr Kuznetsov Pavlovich");
        assert_eq!(view.customer_vehicle.customer.email, "igor@example.com");
        assert_eq!(view.customer_vehicle.car.model, "Rio");
        assert_eq!(view.customer_vehicle.car.brand, "Kia");
    }

    #[tokio::test]
    async fn test_missing_service_is_not_found() {
        let store = InMemoryOrderStore::new();
        let mut order = order_with(&store, &[(100, 60)]).await;
        let ghost = ServiceId::new();
        order.service_ids.push(ghost);

        let result = OrderAggregator::new(store).summarize(&order).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotFound { entity: "service", ref id }))
                if *id == ghost.to_string()
        ));
    }

    #[tokio::test]
    async fn test_missing_employee_is_not_found() {
        let store = InMemoryOrderStore::new();
        let mut order = order_with(&store, &[]).await;
        order.employee_id = UserId::new();

        let result = OrderAggregator::new(store).summarize(&order).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotFound { entity: "user", .. }))
        ));
    }
}
