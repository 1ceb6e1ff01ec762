//! Order lifecycle engine.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use store::{
    CustomerVehicleId, NewOrder, OrderId, OrderQuery, OrderRecord, OrderStore, ServiceAttachment,
    ServiceId, ServiceRecord, StatusTransition, StoreError, UserId, UserRecord,
};

use super::{
    ListOrders, OrderAggregator, OrderError, OrderPage, OrderView, end_time_after, sort_page,
    total_duration,
};
use crate::access::Caller;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::notification::NotificationDispatcher;

/// How many times a service attachment is tried against a moving order.
const MAX_ATTACH_ATTEMPTS: u32 = 2;

/// Request to open a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub customer_vehicle_id: CustomerVehicleId,
    pub employee_id: UserId,
    pub administrator_id: UserId,
    pub service_ids: Vec<ServiceId>,
}

impl CreateOrder {
    /// Creates a request without services.
    pub fn new(
        customer_vehicle_id: CustomerVehicleId,
        employee_id: UserId,
        administrator_id: UserId,
    ) -> Self {
        Self {
            customer_vehicle_id,
            employee_id,
            administrator_id,
            service_ids: Vec::new(),
        }
    }

    /// Sets the initial services.
    pub fn with_services(mut self, service_ids: impl IntoIterator<Item = ServiceId>) -> Self {
        self.service_ids = service_ids.into_iter().collect();
        self
    }
}

/// Outcome of one completion sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// In-progress orders loaded.
    pub examined: usize,
    /// Orders this sweep moved to completed.
    pub completed: usize,
    /// Completion messages delivered.
    pub notified: usize,
    /// Completion messages the dispatcher failed to deliver.
    pub notification_failures: usize,
    /// Orders skipped because of a store or data error.
    pub errors: usize,
}

/// Service for managing the order lifecycle.
///
/// Creates orders, attaches services, and completes orders whose end time has
/// passed. Completion is driven only by [`OrderService::sweep`].
pub struct OrderService<S: OrderStore> {
    store: S,
    aggregator: OrderAggregator<S>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl<S: OrderStore + Clone> OrderService<S> {
    /// Creates a new order service on the wall clock.
    pub fn new(store: S, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            aggregator: OrderAggregator::new(store.clone()),
            store,
            dispatcher,
            clock: Arc::new(SystemClock),
        }
    }
}

impl<S: OrderStore> OrderService<S> {
    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens an order in progress.
    ///
    /// The order starts now and ends after the summed duration of its initial
    /// services. The order row and its association rows are written together.
    #[tracing::instrument(skip(self, request), fields(customer_vehicle_id = %request.customer_vehicle_id))]
    pub async fn create(&self, request: CreateOrder) -> Result<OrderRecord> {
        let services = self.resolve_services(&request.service_ids).await?;
        if let Some(repeated) = first_repeated(&services) {
            return Err(duplicate(repeated).into());
        }

        if self
            .store
            .get_customer_vehicle(request.customer_vehicle_id)
            .await?
            .is_none()
        {
            return Err(invalid_reference("customer vehicle", request.customer_vehicle_id).into());
        }
        for user_id in [request.employee_id, request.administrator_id] {
            if self.store.get_user(user_id).await?.is_none() {
                return Err(invalid_reference("user", user_id).into());
            }
        }

        let start_time = self.clock.now();
        let end_time = end_time_after(start_time, total_duration(&services)?)?;

        let order = self
            .store
            .insert_order(NewOrder {
                id: OrderId::new(),
                start_time,
                end_time,
                customer_vehicle_id: request.customer_vehicle_id,
                employee_id: request.employee_id,
                administrator_id: request.administrator_id,
                service_ids: request.service_ids,
            })
            .await?;

        counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            services = order.service_ids.len(),
            "Order created"
        );

        Ok(order)
    }

    /// Attaches services to an order in progress and extends its end time.
    ///
    /// The batch is validated as a whole first: an unknown id, an id already
    /// on the order, or an id repeated in the batch rejects it and nothing is
    /// written. If the order changes underneath (for example a sweep
    /// completes it), the order is reloaded and the attempt repeated once.
    #[tracing::instrument(skip(self, service_ids), fields(services = service_ids.len()))]
    pub async fn add_services(
        &self,
        order_id: OrderId,
        service_ids: Vec<ServiceId>,
    ) -> Result<OrderRecord> {
        let mut order = self.load(order_id).await?;
        ensure_open(&order)?;
        let services = self.resolve_services(&service_ids).await?;

        let mut attempt = 1;
        loop {
            if let Some(attached) = services.iter().find(|s| order.has_service(s.id)) {
                return Err(duplicate(attached).into());
            }
            if let Some(repeated) = first_repeated(&services) {
                return Err(duplicate(repeated).into());
            }
            if services.is_empty() {
                return Ok(order);
            }

            let end_time = end_time_after(
                self.current_end_time(&order).await?,
                total_duration(&services)?,
            )?;
            let attachment = ServiceAttachment {
                order_id,
                service_ids: services.iter().map(|s| s.id).collect(),
                end_time,
                expected_version: order.version,
            };

            match self.store.insert_associations(attachment).await {
                Ok(version) => {
                    order.service_ids.extend(services.iter().map(|s| s.id));
                    order.end_time = Some(end_time);
                    order.version = version;
                    tracing::info!(%order_id, %end_time, "Services attached");
                    return Ok(order);
                }
                Err(StoreError::ConcurrencyConflict {
                    expected, actual, ..
                }) if attempt < MAX_ATTACH_ATTEMPTS => {
                    tracing::debug!(%order_id, expected, actual, "Order changed, retrying");
                    attempt += 1;
                    order = self.load(order_id).await?;
                    ensure_open(&order)?;
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    return Err(OrderError::Conflict { order_id }.into());
                }
                Err(StoreError::DuplicateAssociation { service_id, .. }) => {
                    return Err(duplicate_by_id(&services, service_id).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Completes every in-progress order whose end time has passed.
    ///
    /// Each transition is conditional, so concurrent sweeps complete and
    /// notify an order at most once. Failures on one order are logged and
    /// counted; they never stop the pass.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let now = self.clock.now();

        let (orders, _) = self.store.list_orders(OrderQuery::in_progress()).await?;
        let mut report = SweepReport {
            examined: orders.len(),
            ..SweepReport::default()
        };

        for order in orders.iter().filter(|o| o.is_due(now)) {
            let transition = StatusTransition::complete_if_due(order.id, now);
            match self.store.update_order_status(transition).await {
                Ok(Some(completed)) => {
                    report.completed += 1;
                    counter!("orders_completed_total").increment(1);
                    tracing::info!(order_id = %completed.id, "Order completed");
                    self.notify_completion(&completed, &mut report).await;
                }
                Ok(None) => {
                    tracing::debug!(order_id = %order.id, "Order already transitioned");
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(order_id = %order.id, error = %e, "Failed to complete order");
                }
            }
        }

        histogram!("order_sweep_duration_seconds").record(started.elapsed().as_secs_f64());
        counter!("order_sweeps_total").increment(1);
        tracing::info!(
            examined = report.examined,
            completed = report.completed,
            notified = report.notified,
            notification_failures = report.notification_failures,
            errors = report.errors,
            "Sweep finished"
        );

        Ok(report)
    }

    /// Deletes an order in any state together with its associations.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, order_id: OrderId) -> Result<()> {
        if !self.store.delete_order(order_id).await? {
            return Err(OrderError::order_not_found(order_id).into());
        }
        tracing::info!(%order_id, "Order deleted");
        Ok(())
    }

    /// Loads an order with its totals and display data.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, order_id: OrderId) -> Result<OrderView> {
        let order = self.load(order_id).await?;
        self.aggregator.summarize(&order).await
    }

    /// Computes totals and display data for an order already loaded.
    pub async fn summarize(&self, order: &OrderRecord) -> Result<OrderView> {
        self.aggregator.summarize(order).await
    }

    /// Lists the orders a caller may see.
    ///
    /// The total counts the filtered set. Sorting reorders only the rows of
    /// the requested page.
    #[tracing::instrument(skip(self, params), fields(role = %caller.role))]
    pub async fn list(&self, caller: &Caller, params: ListOrders) -> Result<OrderPage> {
        let mut query = OrderQuery::new().offset(params.skip).limit(params.limit);
        if let Some(status) = params.status {
            query = query.status(status);
        }

        let (records, total_count) = self.store.list_orders(caller.scope(query)).await?;
        let mut orders = self.aggregator.summarize_all(&records).await?;
        sort_page(&mut orders, &params.sort_by, params.sort_order);

        Ok(OrderPage {
            total_count,
            orders,
        })
    }

    /// Lists every order started during the current UTC day.
    #[tracing::instrument(skip(self))]
    pub async fn list_today(&self) -> Result<Vec<OrderView>> {
        let start_of_day = start_of_utc_day(self.clock.now());
        let query =
            OrderQuery::new().started_between(start_of_day, start_of_day + Duration::days(1));

        let (records, _) = self.store.list_orders(query).await?;
        self.aggregator.summarize_all(&records).await
    }

    async fn load(&self, order_id: OrderId) -> Result<OrderRecord> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::order_not_found(order_id).into())
    }

    /// Resolves every id in order, rejecting the first unknown one.
    async fn resolve_services(&self, service_ids: &[ServiceId]) -> Result<Vec<ServiceRecord>> {
        let services = self.store.get_services(service_ids).await?;
        if services.len() != service_ids.len()
            && let Some(unknown) = service_ids
                .iter()
                .find(|id| !services.iter().any(|s| s.id == **id))
        {
            return Err(invalid_reference("service", unknown).into());
        }
        Ok(services)
    }

    /// The stored end time, or the one implied by the attached services.
    async fn current_end_time(&self, order: &OrderRecord) -> Result<DateTime<Utc>> {
        if let Some(end_time) = order.end_time {
            return Ok(end_time);
        }
        let attached = self.store.get_services(&order.service_ids).await?;
        Ok(end_time_after(order.start_time, total_duration(&attached)?)?)
    }

    async fn notify_completion(&self, order: &OrderRecord, report: &mut SweepReport) {
        let recipient = match self.vehicle_owner(order).await {
            Ok(recipient) => recipient,
            Err(e) => {
                report.errors += 1;
                tracing::warn!(order_id = %order.id, error = %e, "Cannot resolve order owner");
                return;
            }
        };
        if !recipient.notify_on_completion {
            return;
        }

        match self.dispatcher.notify(&recipient, order.id).await {
            Ok(()) => {
                report.notified += 1;
                counter!("order_notifications_total", "outcome" => "sent").increment(1);
            }
            Err(e) => {
                report.notification_failures += 1;
                counter!("order_notifications_total", "outcome" => "failed").increment(1);
                tracing::warn!(order_id = %order.id, error = %e, "Completion notification failed");
            }
        }
    }

    async fn vehicle_owner(&self, order: &OrderRecord) -> Result<UserRecord> {
        let vehicle = self
            .store
            .get_customer_vehicle(order.customer_vehicle_id)
            .await?
            .ok_or_else(|| OrderError::NotFound {
                entity: "customer vehicle",
                id: order.customer_vehicle_id.to_string(),
            })?;
        let owner = self
            .store
            .get_user(vehicle.owner_id)
            .await?
            .ok_or_else(|| OrderError::NotFound {
                entity: "user",
                id: vehicle.owner_id.to_string(),
            })?;
        Ok(owner)
    }
}

fn ensure_open(order: &OrderRecord) -> std::result::Result<(), OrderError> {
    if order.status.can_add_services() {
        Ok(())
    } else {
        Err(OrderError::InvalidState(
            "cannot modify a completed order".to_string(),
        ))
    }
}

fn first_repeated(services: &[ServiceRecord]) -> Option<&ServiceRecord> {
    let mut seen = HashSet::with_capacity(services.len());
    services.iter().find(|s| !seen.insert(s.id))
}

fn duplicate(service: &ServiceRecord) -> OrderError {
    OrderError::DuplicateService {
        service_id: service.id,
        name: service.name.clone(),
    }
}

fn duplicate_by_id(services: &[ServiceRecord], service_id: ServiceId) -> OrderError {
    match services.iter().find(|s| s.id == service_id) {
        Some(service) => duplicate(service),
        None => OrderError::DuplicateService {
            service_id,
            name: service_id.to_string(),
        },
    }
}

fn invalid_reference(entity: &'static str, id: impl ToString) -> OrderError {
    OrderError::InvalidReference {
        entity,
        id: id.to_string(),
    }
}

fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainError;
    use crate::clock::ManualClock;
    use crate::notification::InMemoryDispatcher;
    use chrono::TimeZone;
    use store::{
        BrandId, CarModelId, CatalogStore, InMemoryOrderStore, NewBrand, NewCarModel,
        NewCustomerVehicle, NewService, NewUser, OrderRepository, OrderStatus, Role,
    };

    struct Setup {
        service: OrderService<InMemoryOrderStore>,
        clock: ManualClock,
        dispatcher: InMemoryDispatcher,
        vehicle: CustomerVehicleId,
        admin: UserId,
        wash: ServiceId,
        wax: ServiceId,
    }

    async fn setup(notify: bool) -> Setup {
        let store = InMemoryOrderStore::new();
        let mut users = Vec::new();
        for (role, opt_in) in [(Role::Customer, notify), (Role::Administrator, false)] {
            let user = store
                .insert_user(NewUser {
                    id: UserId::new(),
                    email: format!("{role}@example.com"),
                    first_name: "Vera".to_string(),
                    last_name: "Orlova".to_string(),
                    patronymic: String::new(),
                    role,
                    notify_on_completion: opt_in,
                })
                .await
                .unwrap();
            users.push(user.id);
        }
        let brand = store
            .insert_brand(NewBrand {
                id: BrandId::new(),
                name: "Skoda".to_string(),
            })
            .await
            .unwrap();
        let model = store
            .insert_car_model(NewCarModel {
                id: CarModelId::new(),
                model: "Octavia".to_string(),
                brand_id: brand.id,
            })
            .await
            .unwrap();
        let vehicle = store
            .insert_customer_vehicle(NewCustomerVehicle {
                id: CustomerVehicleId::new(),
                car_model_id: model.id,
                owner_id: users[0],
                year: 2021,
                number: "B222BB".to_string(),
            })
            .await
            .unwrap();
        let mut services = Vec::new();
        for (name, price, secs) in [("Wash", 50_000, 600), ("Wax", 20_000, 300)] {
            let service = store
                .insert_service(NewService {
                    id: ServiceId::new(),
                    name: name.to_string(),
                    price_minor_units: price,
                    duration_seconds: secs,
                })
                .await
                .unwrap();
            services.push(service.id);
        }

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let dispatcher = InMemoryDispatcher::new();
        let service = OrderService::new(store, Arc::new(dispatcher.clone()))
            .with_clock(Arc::new(clock.clone()));

        Setup {
            service,
            clock,
            dispatcher,
            vehicle: vehicle.id,
            admin: users[1],
            wash: services[0],
            wax: services[1],
        }
    }

    fn request(s: &Setup, services: Vec<ServiceId>) -> CreateOrder {
        CreateOrder::new(s.vehicle, s.admin, s.admin).with_services(services)
    }

    #[tokio::test]
    async fn test_create_sets_end_time_from_durations() {
        let s = setup(false).await;
        let order = s.service.create(request(&s, vec![s.wash, s.wax])).await.unwrap();

        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.start_time, s.clock.now());
        assert_eq!(order.end_time, Some(s.clock.now() + Duration::seconds(900)));
    }

    #[tokio::test]
    async fn test_create_without_services_ends_at_start() {
        let s = setup(false).await;
        let order = s.service.create(request(&s, vec![])).await.unwrap();
        assert_eq!(order.end_time, Some(order.start_time));
    }

    #[tokio::test]
    async fn test_create_with_unknown_vehicle() {
        let s = setup(false).await;
        let mut req = request(&s, vec![s.wash]);
        req.customer_vehicle_id = CustomerVehicleId::new();

        let result = s.service.create(req).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidReference {
                entity: "customer vehicle",
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_add_services_extends_end_time() {
        let s = setup(false).await;
        let order = s.service.create(request(&s, vec![s.wash])).await.unwrap();

        let updated = s.service.add_services(order.id, vec![s.wax]).await.unwrap();
        assert_eq!(updated.service_ids, vec![s.wash, s.wax]);
        assert_eq!(updated.end_time, Some(order.start_time + Duration::seconds(900)));
        assert_eq!(updated.version, order.version + 1);
    }

    #[tokio::test]
    async fn test_add_services_to_missing_order() {
        let s = setup(false).await;
        let result = s.service.add_services(OrderId::new(), vec![s.wax]).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotFound { entity: "order", .. }))
        ));
    }

    #[tokio::test]
    async fn test_sweep_completes_due_orders_only() {
        let s = setup(true).await;
        let due = s.service.create(request(&s, vec![s.wash])).await.unwrap();
        s.clock.advance(Duration::minutes(5));
        let later = s.service.create(request(&s, vec![s.wash])).await.unwrap();

        // First order ends at +10 min, second at +15 min
        s.clock.advance(Duration::minutes(6));
        let report = s.service.sweep().await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.notified, 1);
        let stored = s.service.store().get_order(due.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        let stored = s.service.store().get_order(later.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::InProgress);
        assert_eq!(s.dispatcher.sent()[0].order_id, due.id);
    }

    #[tokio::test]
    async fn test_order_is_not_due_at_exact_end_time() {
        let s = setup(false).await;
        s.service.create(request(&s, vec![s.wash])).await.unwrap();

        s.clock.advance(Duration::minutes(10));
        let report = s.service.sweep().await.unwrap();
        assert_eq!(report.completed, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_order() {
        let s = setup(false).await;
        let result = s.service.delete(OrderId::new()).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_start_of_utc_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();
        assert_eq!(
            start_of_utc_day(now),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
    }
}
