use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{
    PgPool, Row,
    postgres::{PgArguments, PgRow},
    query::Query,
};
use uuid::Uuid;

use crate::{
    BrandId, BrandPatch, BrandRecord, CarModelId, CarModelPatch, CarModelRecord,
    CustomerVehicleId, CustomerVehiclePatch, CustomerVehicleRecord, NewBrand, NewCarModel,
    NewCustomerVehicle, NewOrder, NewService, NewUser, OrderId, OrderQuery, OrderRecord,
    OrderStatus, Result, Role, ServiceAttachment, ServiceId, ServicePatch, ServiceRecord,
    StatusTransition, StoreError, UserId, UserRecord,
    store::{
        CatalogStore, OrderRepository, page_bound, validate_attachment, validate_new_order,
        validate_service_amounts,
    },
};

const ORDER_COLUMNS: &str = "id, status, start_time, end_time, customer_vehicle_id, employee_id, administrator_id, version";
const USER_COLUMNS: &str =
    "id, email, first_name, last_name, patronymic, role, notify_on_completion";
const VEHICLE_COLUMNS: &str = "id, car_model_id, owner_id, year, number";

/// A constraint violation reported by PostgreSQL.
enum Violation<'a> {
    Unique(&'a str),
    ForeignKey(&'a str),
}

fn violation(e: &sqlx::Error) -> Option<Violation<'_>> {
    let sqlx::Error::Database(db_err) = e else {
        return None;
    };
    let constraint = db_err.constraint()?;
    if db_err.is_unique_violation() {
        Some(Violation::Unique(constraint))
    } else if db_err.is_foreign_key_violation() {
        Some(Violation::ForeignKey(constraint))
    } else {
        None
    }
}

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    fn row_to_order(row: &PgRow, service_ids: Vec<ServiceId>) -> Result<OrderRecord> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;

        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            status,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            customer_vehicle_id: CustomerVehicleId::from_uuid(
                row.try_get::<Uuid, _>("customer_vehicle_id")?,
            ),
            employee_id: UserId::from_uuid(row.try_get::<Uuid, _>("employee_id")?),
            administrator_id: UserId::from_uuid(row.try_get::<Uuid, _>("administrator_id")?),
            service_ids,
            version: row.try_get("version")?,
        })
    }

    fn row_to_service(row: &PgRow) -> Result<ServiceRecord> {
        Ok(ServiceRecord {
            id: ServiceId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price_minor_units: row.try_get("price_minor_units")?,
            duration_seconds: row.try_get("duration_seconds")?,
        })
    }

    fn row_to_user(row: &PgRow) -> Result<UserRecord> {
        let role: String = row.try_get("role")?;
        let role = role
            .parse::<Role>()
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;

        Ok(UserRecord {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            patronymic: row.try_get("patronymic")?,
            role,
            notify_on_completion: row.try_get("notify_on_completion")?,
        })
    }

    fn row_to_brand(row: &PgRow) -> Result<BrandRecord> {
        Ok(BrandRecord {
            id: BrandId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
        })
    }

    fn row_to_car_model(row: &PgRow) -> Result<CarModelRecord> {
        Ok(CarModelRecord {
            id: CarModelId::from_uuid(row.try_get::<Uuid, _>("id")?),
            model: row.try_get("model")?,
            brand_id: BrandId::from_uuid(row.try_get::<Uuid, _>("brand_id")?),
        })
    }

    fn row_to_vehicle(row: &PgRow) -> Result<CustomerVehicleRecord> {
        Ok(CustomerVehicleRecord {
            id: CustomerVehicleId::from_uuid(row.try_get::<Uuid, _>("id")?),
            car_model_id: CarModelId::from_uuid(row.try_get::<Uuid, _>("car_model_id")?),
            owner_id: UserId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            year: row.try_get("year")?,
            number: row.try_get("number")?,
        })
    }

    /// Loads attached services for a set of orders, in attachment order.
    async fn load_service_ids(
        &self,
        order_ids: &[Uuid],
    ) -> Result<HashMap<OrderId, Vec<ServiceId>>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, service_id
            FROM order_services
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<ServiceId>> = HashMap::new();
        for row in rows {
            let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?);
            let service_id = ServiceId::from_uuid(row.try_get::<Uuid, _>("service_id")?);
            by_order.entry(order_id).or_default().push(service_id);
        }
        Ok(by_order)
    }

    async fn rows_to_orders(&self, rows: Vec<PgRow>) -> Result<Vec<OrderRecord>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut services = self.load_service_ids(&ids).await?;

        ids.into_iter()
            .zip(rows.iter())
            .map(|(id, row)| {
                let service_ids = services
                    .remove(&OrderId::from_uuid(id))
                    .unwrap_or_default();
                Self::row_to_order(row, service_ids)
            })
            .collect()
    }

    fn order_filter_sql(query: &OrderQuery) -> String {
        let mut sql = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if query.employee_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND employee_id = ${param_count}"));
        }
        if query.customer_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND customer_vehicle_id IN (SELECT id FROM customer_vehicles WHERE owner_id = ${param_count})"
            ));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.started_from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND start_time >= ${param_count}"));
        }
        if query.started_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND start_time < ${param_count}"));
        }

        sql
    }

    fn bind_order_filters<'q>(
        mut sqlx_query: Query<'q, sqlx::Postgres, PgArguments>,
        query: &OrderQuery,
    ) -> Query<'q, sqlx::Postgres, PgArguments> {
        if let Some(id) = query.employee_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.customer_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(from) = query.started_from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(before) = query.started_before {
            sqlx_query = sqlx_query.bind(before);
        }
        sqlx_query
    }

    fn filter_param_count(query: &OrderQuery) -> usize {
        [
            query.employee_id.is_some(),
            query.customer_id.is_some(),
            query.status.is_some(),
            query.started_from.is_some(),
            query.started_before.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderStore {
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRecord> {
        validate_new_order(&order)?;

        // Start a transaction
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, status, start_time, end_time, customer_vehicle_id, employee_id, administrator_id, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id.as_uuid())
        .bind(OrderStatus::InProgress.as_str())
        .bind(order.start_time)
        .bind(order.end_time)
        .bind(order.customer_vehicle_id.as_uuid())
        .bind(order.employee_id.as_uuid())
        .bind(order.administrator_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique("orders_pkey")) => StoreError::AlreadyExists {
                entity: "order",
                key: order.id.to_string(),
            },
            Some(Violation::ForeignKey("orders_customer_vehicle_id_fkey")) => {
                StoreError::missing_reference("customer vehicle", order.customer_vehicle_id)
            }
            Some(Violation::ForeignKey("orders_employee_id_fkey")) => {
                StoreError::missing_reference("user", order.employee_id)
            }
            Some(Violation::ForeignKey("orders_administrator_id_fkey")) => {
                StoreError::missing_reference("user", order.administrator_id)
            }
            _ => StoreError::Database(e),
        })?;

        // Insert the initial association rows
        for service_id in &order.service_ids {
            insert_association(&mut tx, order.id, *service_id).await?;
        }

        tx.commit().await?;
        Self::row_to_order(&row, order.service_ids)
    }

    async fn insert_associations(&self, attachment: ServiceAttachment) -> Result<i64> {
        validate_attachment(&attachment)?;
        let order_id = attachment.order_id;

        let mut tx = self.pool.begin().await?;

        // Lock the order row for the rest of the transaction
        let row: Option<PgRow> =
            sqlx::query("SELECT version, status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(row) = row else {
            return Err(StoreError::not_found("order", order_id));
        };

        let actual: i64 = row.try_get("version")?;
        if actual != attachment.expected_version {
            tracing::debug!(
                %order_id,
                expected = attachment.expected_version,
                actual,
                "Order changed since it was read"
            );
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected: attachment.expected_version,
                actual,
            });
        }

        let status: String = row.try_get("status")?;
        if status != OrderStatus::InProgress.as_str() {
            return Err(StoreError::InvalidInput(format!(
                "order {order_id} is {status}"
            )));
        }

        for service_id in &attachment.service_ids {
            insert_association(&mut tx, order_id, *service_id).await?;
        }

        let version: i64 = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET end_time = $2, version = version + 1
            WHERE id = $1
            RETURNING version
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(attachment.end_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(self.rows_to_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<(Vec<OrderRecord>, u64)> {
        let limit = query.limit.map(|v| page_bound(v, "limit")).transpose()?;
        let offset = query.offset.map(|v| page_bound(v, "offset")).transpose()?;
        let filter = Self::order_filter_sql(&query);

        let count_sql = format!("SELECT COUNT(*) AS total FROM orders{filter}");
        let count_row = Self::bind_order_filters(sqlx::query(&count_sql), &query)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = count_row.try_get("total")?;

        // Build dynamic query
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders{filter}");
        sql.push_str(" ORDER BY start_time ASC, id ASC");

        let mut param_count = Self::filter_param_count(&query);
        if limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = Self::bind_order_filters(sqlx::query(&sql), &query);
        if let Some(limit) = limit {
            sqlx_query = sqlx_query.bind(limit);
        }
        if let Some(offset) = offset {
            sqlx_query = sqlx_query.bind(offset);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        let orders = self.rows_to_orders(rows).await?;

        Ok((orders, total as u64))
    }

    async fn update_order_status(
        &self,
        transition: StatusTransition,
    ) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $2, version = version + 1
            WHERE id = $1 AND status = $3 AND end_time < $4
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(transition.order_id.as_uuid())
        .bind(transition.to.as_str())
        .bind(transition.from.as_str())
        .bind(transition.due_before)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.rows_to_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        // Association rows go with the order via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_association(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
    service_id: ServiceId,
) -> Result<()> {
    sqlx::query("INSERT INTO order_services (order_id, service_id) VALUES ($1, $2)")
        .bind(order_id.as_uuid())
        .bind(service_id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique("unique_order_service")) => StoreError::DuplicateAssociation {
                order_id,
                service_id,
            },
            Some(Violation::ForeignKey("order_services_service_id_fkey")) => {
                StoreError::missing_reference("service", service_id)
            }
            _ => StoreError::Database(e),
        })?;
    Ok(())
}

#[async_trait]
impl CatalogStore for PostgresOrderStore {
    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord> {
        validate_service_amounts(
            Some(service.price_minor_units),
            Some(service.duration_seconds),
        )?;

        let row = sqlx::query(
            r#"
            INSERT INTO services (id, name, price_minor_units, duration_seconds)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, price_minor_units, duration_seconds
            "#,
        )
        .bind(service.id.as_uuid())
        .bind(&service.name)
        .bind(service.price_minor_units)
        .bind(service.duration_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                entity: "service",
                key: service.id.to_string(),
            },
            _ => StoreError::Database(e),
        })?;

        Self::row_to_service(&row)
    }

    async fn get_service(&self, service_id: ServiceId) -> Result<Option<ServiceRecord>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, price_minor_units, duration_seconds FROM services WHERE id = $1",
        )
        .bind(service_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_service).transpose()
    }

    async fn get_services(&self, service_ids: &[ServiceId]) -> Result<Vec<ServiceRecord>> {
        let ids: Vec<Uuid> = service_ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, name, price_minor_units, duration_seconds FROM services WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in &rows {
            let service = Self::row_to_service(row)?;
            by_id.insert(service.id, service);
        }

        // Preserve the caller's order
        Ok(service_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect())
    }

    async fn list_services(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<ServiceRecord>, u64)> {
        let limit = page_bound(limit, "limit")?;
        let offset = page_bound(offset, "offset")?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM services")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, price_minor_units, duration_seconds
            FROM services
            ORDER BY name ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let services = rows
            .iter()
            .map(Self::row_to_service)
            .collect::<Result<Vec<_>>>()?;
        Ok((services, total as u64))
    }

    async fn update_service(
        &self,
        service_id: ServiceId,
        patch: ServicePatch,
    ) -> Result<ServiceRecord> {
        validate_service_amounts(patch.price_minor_units, patch.duration_seconds)?;

        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE services
            SET name = COALESCE($2, name),
                price_minor_units = COALESCE($3, price_minor_units),
                duration_seconds = COALESCE($4, duration_seconds)
            WHERE id = $1
            RETURNING id, name, price_minor_units, duration_seconds
            "#,
        )
        .bind(service_id.as_uuid())
        .bind(patch.name)
        .bind(patch.price_minor_units)
        .bind(patch.duration_seconds)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_service(&row),
            None => Err(StoreError::not_found("service", service_id)),
        }
    }

    async fn delete_service(&self, service_id: ServiceId) -> Result<()> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(service_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey(_)) => StoreError::ReferenceInUse {
                    entity: "service",
                    id: service_id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("service", service_id));
        }
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, patronymic, role, notify_on_completion)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, first_name, last_name, patronymic, role, notify_on_completion
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.patronymic)
        .bind(user.role.as_str())
        .bind(user.notify_on_completion)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                entity: "user",
                key: user.id.to_string(),
            },
            _ => StoreError::Database(e),
        })?;

        Self::row_to_user(&row)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, email, first_name, last_name, patronymic, role, notify_on_completion
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn insert_brand(&self, brand: NewBrand) -> Result<BrandRecord> {
        sqlx::query("INSERT INTO brands (id, name) VALUES ($1, $2)")
            .bind(brand.id.as_uuid())
            .bind(&brand.name)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::Unique("unique_brand_name")) => StoreError::AlreadyExists {
                    entity: "brand",
                    key: brand.name.clone(),
                },
                Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                    entity: "brand",
                    key: brand.id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;

        Ok(BrandRecord {
            id: brand.id,
            name: brand.name,
        })
    }

    async fn get_brand(&self, brand_id: BrandId) -> Result<Option<BrandRecord>> {
        let row: Option<PgRow> = sqlx::query("SELECT id, name FROM brands WHERE id = $1")
            .bind(brand_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_brand).transpose()
    }

    async fn insert_car_model(&self, car_model: NewCarModel) -> Result<CarModelRecord> {
        sqlx::query("INSERT INTO car_models (id, model, brand_id) VALUES ($1, $2, $3)")
            .bind(car_model.id.as_uuid())
            .bind(&car_model.model)
            .bind(car_model.brand_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::Unique("unique_car_model")) => StoreError::AlreadyExists {
                    entity: "car model",
                    key: car_model.model.clone(),
                },
                Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                    entity: "car model",
                    key: car_model.id.to_string(),
                },
                Some(Violation::ForeignKey(_)) => {
                    StoreError::missing_reference("brand", car_model.brand_id)
                }
                _ => StoreError::Database(e),
            })?;

        Ok(CarModelRecord {
            id: car_model.id,
            model: car_model.model,
            brand_id: car_model.brand_id,
        })
    }

    async fn get_car_model(&self, car_model_id: CarModelId) -> Result<Option<CarModelRecord>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, model, brand_id FROM car_models WHERE id = $1")
                .bind(car_model_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(Self::row_to_car_model).transpose()
    }

    async fn insert_customer_vehicle(
        &self,
        vehicle: NewCustomerVehicle,
    ) -> Result<CustomerVehicleRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO customer_vehicles (id, car_model_id, owner_id, year, number)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, car_model_id, owner_id, year, number
            "#,
        )
        .bind(vehicle.id.as_uuid())
        .bind(vehicle.car_model_id.as_uuid())
        .bind(vehicle.owner_id.as_uuid())
        .bind(vehicle.year)
        .bind(&vehicle.number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                entity: "customer vehicle",
                key: vehicle.id.to_string(),
            },
            Some(Violation::ForeignKey("customer_vehicles_car_model_id_fkey")) => {
                StoreError::missing_reference("car model", vehicle.car_model_id)
            }
            Some(Violation::ForeignKey(_)) => {
                StoreError::missing_reference("user", vehicle.owner_id)
            }
            _ => StoreError::Database(e),
        })?;

        Self::row_to_vehicle(&row)
    }

    async fn get_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
    ) -> Result<Option<CustomerVehicleRecord>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, car_model_id, owner_id, year, number FROM customer_vehicles WHERE id = $1",
        )
        .bind(vehicle_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_vehicle).transpose()
    }

    async fn list_users(&self, offset: usize, limit: usize) -> Result<(Vec<UserRecord>, u64)> {
        let limit = page_bound(limit, "limit")?;
        let offset = page_bound(offset, "offset")?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY email ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .iter()
            .map(Self::row_to_user)
            .collect::<Result<Vec<_>>>()?;
        Ok((users, total as u64))
    }

    async fn delete_user(&self, user_id: UserId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey(_)) => StoreError::ReferenceInUse {
                    entity: "user",
                    id: user_id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn list_brands(&self, offset: usize, limit: usize) -> Result<(Vec<BrandRecord>, u64)> {
        let limit = page_bound(limit, "limit")?;
        let offset = page_bound(offset, "offset")?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM brands")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT id, name FROM brands ORDER BY name ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let brands = rows
            .iter()
            .map(Self::row_to_brand)
            .collect::<Result<Vec<_>>>()?;
        Ok((brands, total as u64))
    }

    async fn get_brand_by_name(&self, name: &str) -> Result<Option<BrandRecord>> {
        let row: Option<PgRow> = sqlx::query("SELECT id, name FROM brands WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_brand).transpose()
    }

    async fn update_brand(&self, brand_id: BrandId, patch: BrandPatch) -> Result<BrandRecord> {
        let row: Option<PgRow> = sqlx::query(
            "UPDATE brands SET name = COALESCE($2, name) WHERE id = $1 RETURNING id, name",
        )
        .bind(brand_id.as_uuid())
        .bind(&patch.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                entity: "brand",
                key: patch.name.clone().unwrap_or_default(),
            },
            _ => StoreError::Database(e),
        })?;

        match row {
            Some(row) => Self::row_to_brand(&row),
            None => Err(StoreError::not_found("brand", brand_id)),
        }
    }

    async fn delete_brand(&self, brand_id: BrandId) -> Result<()> {
        let result = sqlx::query("DELETE FROM brands WHERE id = $1")
            .bind(brand_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey(_)) => StoreError::ReferenceInUse {
                    entity: "brand",
                    id: brand_id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("brand", brand_id));
        }
        Ok(())
    }

    async fn list_car_models(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<CarModelRecord>, u64)> {
        let limit = page_bound(limit, "limit")?;
        let offset = page_bound(offset, "offset")?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM car_models")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, model, brand_id
            FROM car_models
            ORDER BY model ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let models = rows
            .iter()
            .map(Self::row_to_car_model)
            .collect::<Result<Vec<_>>>()?;
        Ok((models, total as u64))
    }

    async fn update_car_model(
        &self,
        car_model_id: CarModelId,
        patch: CarModelPatch,
    ) -> Result<CarModelRecord> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE car_models
            SET model = COALESCE($2, model),
                brand_id = COALESCE($3, brand_id)
            WHERE id = $1
            RETURNING id, model, brand_id
            "#,
        )
        .bind(car_model_id.as_uuid())
        .bind(&patch.model)
        .bind(patch.brand_id.map(|id| id.as_uuid()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(_)) => StoreError::AlreadyExists {
                entity: "car model",
                key: patch.model.clone().unwrap_or_default(),
            },
            Some(Violation::ForeignKey(_)) => match patch.brand_id {
                Some(brand_id) => StoreError::missing_reference("brand", brand_id),
                None => StoreError::Database(e),
            },
            _ => StoreError::Database(e),
        })?;

        match row {
            Some(row) => Self::row_to_car_model(&row),
            None => Err(StoreError::not_found("car model", car_model_id)),
        }
    }

    async fn delete_car_model(&self, car_model_id: CarModelId) -> Result<()> {
        let result = sqlx::query("DELETE FROM car_models WHERE id = $1")
            .bind(car_model_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey(_)) => StoreError::ReferenceInUse {
                    entity: "car model",
                    id: car_model_id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("car model", car_model_id));
        }
        Ok(())
    }

    async fn list_customer_vehicles(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<CustomerVehicleRecord>, u64)> {
        let limit = page_bound(limit, "limit")?;
        let offset = page_bound(offset, "offset")?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer_vehicles")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {VEHICLE_COLUMNS}
            FROM customer_vehicles
            ORDER BY number ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let vehicles = rows
            .iter()
            .map(Self::row_to_vehicle)
            .collect::<Result<Vec<_>>>()?;
        Ok((vehicles, total as u64))
    }

    async fn update_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
        patch: CustomerVehiclePatch,
    ) -> Result<CustomerVehicleRecord> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE customer_vehicles
            SET car_model_id = COALESCE($2, car_model_id),
                owner_id = COALESCE($3, owner_id),
                year = COALESCE($4, year),
                number = COALESCE($5, number)
            WHERE id = $1
            RETURNING {VEHICLE_COLUMNS}
            "#
        ))
        .bind(vehicle_id.as_uuid())
        .bind(patch.car_model_id.map(|id| id.as_uuid()))
        .bind(patch.owner_id.map(|id| id.as_uuid()))
        .bind(patch.year)
        .bind(&patch.number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match (violation(&e), patch.car_model_id, patch.owner_id) {
            (
                Some(Violation::ForeignKey("customer_vehicles_car_model_id_fkey")),
                Some(car_model_id),
                _,
            ) => StoreError::missing_reference("car model", car_model_id),
            (Some(Violation::ForeignKey("customer_vehicles_owner_id_fkey")), _, Some(owner_id)) => {
                StoreError::missing_reference("user", owner_id)
            }
            _ => StoreError::Database(e),
        })?;

        match row {
            Some(row) => Self::row_to_vehicle(&row),
            None => Err(StoreError::not_found("customer vehicle", vehicle_id)),
        }
    }

    async fn delete_customer_vehicle(&self, vehicle_id: CustomerVehicleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM customer_vehicles WHERE id = $1")
            .bind(vehicle_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey(_)) => StoreError::ReferenceInUse {
                    entity: "customer vehicle",
                    id: vehicle_id.to_string(),
                },
                _ => StoreError::Database(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("customer vehicle", vehicle_id));
        }
        Ok(())
    }
}
