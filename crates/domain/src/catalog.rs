//! Catalog management: services, brands, car models, customer vehicles and users.
//!
//! Clients speak in major currency units and minutes; storage keeps minor
//! units and seconds. Conversions happen here.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use store::{
    BrandId, BrandPatch, BrandRecord, CarModelId, CarModelPatch, CarModelRecord, CatalogStore,
    CustomerVehicleId, CustomerVehiclePatch, CustomerVehicleRecord, NewBrand, NewCarModel,
    NewCustomerVehicle, NewService, NewUser, Role, ServiceId, ServicePatch, ServiceRecord,
    UserId, UserRecord,
};

use crate::error::Result;
use crate::order::{Money, OrderError, ServiceDuration};

/// Oldest registration year accepted for a customer vehicle.
pub const MIN_VEHICLE_YEAR: i32 = 1920;

/// Default page size of the catalog listings.
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Highest price of a catalog service, in major units.
pub const MAX_SERVICE_PRICE: i64 = 10_000_000;

/// Longest duration of a catalog service, in minutes.
pub const MAX_SERVICE_MINUTES: i64 = 24 * 60;

/// A new catalog service as entered by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDraft {
    pub name: String,
    /// Price in whole major units.
    pub price: i64,
    /// Duration in whole minutes.
    pub time: i64,
}

/// Fields of a catalog service to change, in client units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub time: Option<i64>,
}

fn money_from_major(price: i64) -> std::result::Result<Money, OrderError> {
    if !(0..=MAX_SERVICE_PRICE).contains(&price) {
        return Err(OrderError::InvalidInput(format!(
            "price must be between 0 and {MAX_SERVICE_PRICE}, got {price}"
        )));
    }
    Money::from_major_units(price)
        .ok_or_else(|| OrderError::InvalidInput(format!("price {price} is too large")))
}

fn duration_from_minutes(time: i64) -> std::result::Result<ServiceDuration, OrderError> {
    if !(0..=MAX_SERVICE_MINUTES).contains(&time) {
        return Err(OrderError::InvalidInput(format!(
            "time must be between 0 and {MAX_SERVICE_MINUTES} minutes, got {time}"
        )));
    }
    ServiceDuration::from_minutes(time)
        .ok_or_else(|| OrderError::InvalidInput(format!("time {time} is too large")))
}

impl ServiceDraft {
    /// Converts to storage units under a fresh id.
    pub fn into_new_service(self) -> std::result::Result<NewService, OrderError> {
        let price = money_from_major(self.price)?;
        let duration = duration_from_minutes(self.time)?;
        Ok(NewService {
            id: ServiceId::new(),
            name: self.name,
            price_minor_units: price.minor_units(),
            duration_seconds: duration.seconds(),
        })
    }
}

impl ServiceUpdate {
    /// Converts to a storage patch.
    pub fn into_patch(self) -> std::result::Result<ServicePatch, OrderError> {
        let mut patch = ServicePatch::new();
        if let Some(name) = self.name {
            patch = patch.name(name);
        }
        if let Some(price) = self.price {
            patch = patch.price_minor_units(money_from_major(price)?.minor_units());
        }
        if let Some(time) = self.time {
            patch = patch.duration_seconds(duration_from_minutes(time)?.seconds());
        }
        Ok(patch)
    }
}

/// Price in storage and display units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceView {
    pub minor_units: i64,
    pub major_units: i64,
    pub formatted: String,
}

/// Duration in storage and display units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationView {
    pub seconds: i64,
    pub minutes: i64,
}

/// A catalog service as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceView {
    pub id: ServiceId,
    pub name: String,
    pub price: PriceView,
    pub time: DurationView,
}

impl From<&ServiceRecord> for ServiceView {
    fn from(record: &ServiceRecord) -> Self {
        let price = Money::from_minor_units(record.price_minor_units);
        let duration = ServiceDuration::from_seconds(record.duration_seconds);
        Self {
            id: record.id,
            name: record.name.clone(),
            price: PriceView {
                minor_units: price.minor_units(),
                major_units: price.major_units(),
                formatted: price.to_string(),
            },
            time: DurationView {
                seconds: duration.seconds(),
                minutes: duration.minutes(),
            },
        }
    }
}

/// One page of a catalog listing with the size of the whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}

pub type ServicePage = Page<ServiceView>;

/// A new brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandDraft {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandUpdate {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandView {
    pub id: BrandId,
    pub name: String,
}

impl From<BrandRecord> for BrandView {
    fn from(record: BrandRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
        }
    }
}

/// A new car model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarModelDraft {
    pub model: String,
    pub brand_id: BrandId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarModelUpdate {
    pub model: Option<String>,
    pub brand_id: Option<BrandId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarModelView {
    pub id: CarModelId,
    pub model: String,
    pub brand_id: BrandId,
    pub brand_name: String,
}

/// A vehicle a customer registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerVehicleDraft {
    pub car_model_id: CarModelId,
    pub owner_id: UserId,
    pub year: i32,
    pub number: String,
}

/// Fields of a customer vehicle to change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerVehicleUpdate {
    pub car_model_id: Option<CarModelId>,
    pub owner_id: Option<UserId>,
    pub year: Option<i32>,
    pub number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerVehicleSummary {
    pub id: CustomerVehicleId,
    pub car_model_id: CarModelId,
    pub owner_id: UserId,
    pub year: i32,
    pub number: String,
}

impl From<CustomerVehicleRecord> for CustomerVehicleSummary {
    fn from(record: CustomerVehicleRecord) -> Self {
        Self {
            id: record.id,
            car_model_id: record.car_model_id,
            owner_id: record.owner_id,
            year: record.year,
            number: record.number,
        }
    }
}

/// A user to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub patronymic: String,
    pub role: Role,
    #[serde(default)]
    pub notify_on_completion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub notify_on_completion: bool,
}

impl From<UserRecord> for UserView {
    fn from(record: UserRecord) -> Self {
        Self {
            full_name: record.full_name(),
            id: record.id,
            email: record.email,
            role: record.role,
            notify_on_completion: record.notify_on_completion,
        }
    }
}

/// Returns true for plates like `А123ВС77`: one letter, three digits, two
/// letters, then a two or three digit region code. Letters are Cyrillic
/// capitals.
pub fn is_valid_plate_number(number: &str) -> bool {
    fn is_letter(c: char) -> bool {
        ('А'..='Я').contains(&c)
    }

    let chars: Vec<char> = number.chars().collect();
    if !(8..=9).contains(&chars.len()) {
        return false;
    }
    is_letter(chars[0])
        && chars[1..4].iter().all(char::is_ascii_digit)
        && chars[4..6].iter().all(|c| is_letter(*c))
        && chars[6..].iter().all(char::is_ascii_digit)
}

/// Validates a brand name and brings it to `Capitalized` form.
///
/// Names consist of letters only; `bMW` and `BMW` both become `Bmw`.
pub fn normalize_brand_name(name: &str) -> std::result::Result<String, OrderError> {
    if name.is_empty() || !name.chars().all(char::is_alphabetic) {
        return Err(OrderError::InvalidInput(
            "brand name can only contain letters".to_string(),
        ));
    }
    let mut chars = name.chars();
    let first = chars.next().map(|c| c.to_uppercase().collect::<String>());
    Ok(first.unwrap_or_default() + &chars.as_str().to_lowercase())
}

fn check_vehicle_year(year: i32) -> std::result::Result<(), OrderError> {
    let current_year = Utc::now().year();
    if !(MIN_VEHICLE_YEAR..=current_year).contains(&year) {
        return Err(OrderError::InvalidInput(format!(
            "year must be between {MIN_VEHICLE_YEAR} and {current_year}"
        )));
    }
    Ok(())
}

fn check_plate_number(number: &str) -> std::result::Result<(), OrderError> {
    if !is_valid_plate_number(number) {
        return Err(OrderError::InvalidInput(format!(
            "invalid plate number: {number}"
        )));
    }
    Ok(())
}

/// Service for the records orders refer to.
#[derive(Clone)]
pub struct CatalogService<S: CatalogStore> {
    store: S,
}

impl<S: CatalogStore> CatalogService<S> {
    /// Creates a catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a service to the catalog.
    #[tracing::instrument(skip(self))]
    pub async fn create_service(&self, draft: ServiceDraft) -> Result<ServiceView> {
        let record = self.store.insert_service(draft.into_new_service()?).await?;
        tracing::info!(service_id = %record.id, "Service created");
        Ok(ServiceView::from(&record))
    }

    /// Loads a catalog service.
    #[tracing::instrument(skip(self))]
    pub async fn get_service(&self, service_id: ServiceId) -> Result<ServiceView> {
        let record = self
            .store
            .get_service(service_id)
            .await?
            .ok_or_else(|| OrderError::not_found("service", service_id))?;
        Ok(ServiceView::from(&record))
    }

    /// Lists catalog services by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_services(&self, skip: usize, limit: usize) -> Result<ServicePage> {
        let (records, total_count) = self.store.list_services(skip, limit).await?;
        Ok(Page {
            total_count,
            items: records.iter().map(ServiceView::from).collect(),
        })
    }

    /// Changes the given fields of a catalog service.
    #[tracing::instrument(skip(self))]
    pub async fn update_service(
        &self,
        service_id: ServiceId,
        update: ServiceUpdate,
    ) -> Result<ServiceView> {
        let patch = update.into_patch()?;
        if patch.is_empty() {
            return self.get_service(service_id).await;
        }
        let record = self.store.update_service(service_id, patch).await?;
        tracing::info!(%service_id, "Service updated");
        Ok(ServiceView::from(&record))
    }

    /// Removes a service no order refers to.
    #[tracing::instrument(skip(self))]
    pub async fn delete_service(&self, service_id: ServiceId) -> Result<()> {
        self.store.delete_service(service_id).await?;
        tracing::info!(%service_id, "Service deleted");
        Ok(())
    }

    /// Adds a brand under its normalized name.
    #[tracing::instrument(skip(self))]
    pub async fn create_brand(&self, draft: BrandDraft) -> Result<BrandView> {
        let record = self
            .store
            .insert_brand(NewBrand {
                id: BrandId::new(),
                name: normalize_brand_name(&draft.name)?,
            })
            .await?;
        tracing::info!(brand_id = %record.id, name = %record.name, "Brand created");
        Ok(record.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_brand(&self, brand_id: BrandId) -> Result<BrandView> {
        let record = self
            .store
            .get_brand(brand_id)
            .await?
            .ok_or_else(|| OrderError::not_found("brand", brand_id))?;
        Ok(record.into())
    }

    /// Lists brands by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_brands(&self, skip: usize, limit: usize) -> Result<Page<BrandView>> {
        let (records, total_count) = self.store.list_brands(skip, limit).await?;
        Ok(Page {
            total_count,
            items: records.into_iter().map(BrandView::from).collect(),
        })
    }

    /// Renames a brand.
    #[tracing::instrument(skip(self))]
    pub async fn update_brand(&self, brand_id: BrandId, update: BrandUpdate) -> Result<BrandView> {
        let patch = BrandPatch {
            name: update
                .name
                .as_deref()
                .map(normalize_brand_name)
                .transpose()?,
        };
        if patch.is_empty() {
            return self.get_brand(brand_id).await;
        }
        let record = self.store.update_brand(brand_id, patch).await?;
        tracing::info!(%brand_id, name = %record.name, "Brand updated");
        Ok(record.into())
    }

    /// Removes a brand no car model belongs to.
    #[tracing::instrument(skip(self))]
    pub async fn delete_brand(&self, brand_id: BrandId) -> Result<()> {
        self.store.delete_brand(brand_id).await?;
        tracing::info!(%brand_id, "Brand deleted");
        Ok(())
    }

    /// Removes a brand addressed by name, in any letter case.
    #[tracing::instrument(skip(self))]
    pub async fn delete_brand_by_name(&self, name: &str) -> Result<()> {
        let name = normalize_brand_name(name)?;
        let brand = self
            .store
            .get_brand_by_name(&name)
            .await?
            .ok_or_else(|| OrderError::not_found("brand", &name))?;
        self.delete_brand(brand.id).await
    }

    /// Adds a car model of an existing brand.
    #[tracing::instrument(skip(self))]
    pub async fn create_car_model(&self, draft: CarModelDraft) -> Result<CarModelView> {
        let brand = self.store.get_brand(draft.brand_id).await?.ok_or_else(|| {
            OrderError::InvalidReference {
                entity: "brand",
                id: draft.brand_id.to_string(),
            }
        })?;
        let record: CarModelRecord = self
            .store
            .insert_car_model(NewCarModel {
                id: CarModelId::new(),
                model: draft.model,
                brand_id: brand.id,
            })
            .await?;
        tracing::info!(car_model_id = %record.id, "Car model created");
        Ok(CarModelView {
            id: record.id,
            model: record.model,
            brand_id: brand.id,
            brand_name: brand.name,
        })
    }

    async fn car_model_view(&self, record: CarModelRecord) -> Result<CarModelView> {
        let brand = self
            .store
            .get_brand(record.brand_id)
            .await?
            .ok_or_else(|| OrderError::not_found("brand", record.brand_id))?;
        Ok(CarModelView {
            id: record.id,
            model: record.model,
            brand_id: brand.id,
            brand_name: brand.name,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_car_model(&self, car_model_id: CarModelId) -> Result<CarModelView> {
        let record = self
            .store
            .get_car_model(car_model_id)
            .await?
            .ok_or_else(|| OrderError::not_found("car model", car_model_id))?;
        self.car_model_view(record).await
    }

    /// Lists car models by model name, each with its brand name.
    #[tracing::instrument(skip(self))]
    pub async fn list_car_models(&self, skip: usize, limit: usize) -> Result<Page<CarModelView>> {
        let (records, total_count) = self.store.list_car_models(skip, limit).await?;

        let mut brand_names: HashMap<BrandId, String> = HashMap::new();
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let brand_name = match brand_names.get(&record.brand_id) {
                Some(name) => name.clone(),
                None => {
                    let brand = self
                        .store
                        .get_brand(record.brand_id)
                        .await?
                        .ok_or_else(|| OrderError::not_found("brand", record.brand_id))?;
                    brand_names.insert(brand.id, brand.name.clone());
                    brand.name
                }
            };
            items.push(CarModelView {
                id: record.id,
                model: record.model,
                brand_id: record.brand_id,
                brand_name,
            });
        }
        Ok(Page { total_count, items })
    }

    /// Changes the model name or moves the model to another existing brand.
    #[tracing::instrument(skip(self))]
    pub async fn update_car_model(
        &self,
        car_model_id: CarModelId,
        update: CarModelUpdate,
    ) -> Result<CarModelView> {
        if let Some(brand_id) = update.brand_id
            && self.store.get_brand(brand_id).await?.is_none()
        {
            return Err(OrderError::InvalidReference {
                entity: "brand",
                id: brand_id.to_string(),
            }
            .into());
        }

        let patch = CarModelPatch {
            model: update.model,
            brand_id: update.brand_id,
        };
        if patch.is_empty() {
            return self.get_car_model(car_model_id).await;
        }
        let record = self.store.update_car_model(car_model_id, patch).await?;
        tracing::info!(%car_model_id, "Car model updated");
        self.car_model_view(record).await
    }

    /// Removes a car model no vehicle refers to.
    #[tracing::instrument(skip(self))]
    pub async fn delete_car_model(&self, car_model_id: CarModelId) -> Result<()> {
        self.store.delete_car_model(car_model_id).await?;
        tracing::info!(%car_model_id, "Car model deleted");
        Ok(())
    }

    /// Registers a customer vehicle.
    #[tracing::instrument(skip(self))]
    pub async fn create_customer_vehicle(
        &self,
        draft: CustomerVehicleDraft,
    ) -> Result<CustomerVehicleSummary> {
        check_vehicle_year(draft.year)?;
        check_plate_number(&draft.number)?;

        let record = self
            .store
            .insert_customer_vehicle(NewCustomerVehicle {
                id: CustomerVehicleId::new(),
                car_model_id: draft.car_model_id,
                owner_id: draft.owner_id,
                year: draft.year,
                number: draft.number,
            })
            .await?;
        tracing::info!(vehicle_id = %record.id, "Customer vehicle registered");
        Ok(record.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
    ) -> Result<CustomerVehicleSummary> {
        let record = self
            .store
            .get_customer_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| OrderError::not_found("customer vehicle", vehicle_id))?;
        Ok(record.into())
    }

    /// Lists customer vehicles by plate number.
    #[tracing::instrument(skip(self))]
    pub async fn list_customer_vehicles(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Page<CustomerVehicleSummary>> {
        let (records, total_count) = self.store.list_customer_vehicles(skip, limit).await?;
        Ok(Page {
            total_count,
            items: records.into_iter().map(Into::into).collect(),
        })
    }

    /// Changes the given fields of a customer vehicle.
    ///
    /// Year and plate number are held to the same rules as on registration.
    #[tracing::instrument(skip(self))]
    pub async fn update_customer_vehicle(
        &self,
        vehicle_id: CustomerVehicleId,
        update: CustomerVehicleUpdate,
    ) -> Result<CustomerVehicleSummary> {
        if let Some(year) = update.year {
            check_vehicle_year(year)?;
        }
        if let Some(ref number) = update.number {
            check_plate_number(number)?;
        }

        let patch = CustomerVehiclePatch {
            car_model_id: update.car_model_id,
            owner_id: update.owner_id,
            year: update.year,
            number: update.number,
        };
        if patch.is_empty() {
            return self.get_customer_vehicle(vehicle_id).await;
        }
        let record = self.store.update_customer_vehicle(vehicle_id, patch).await?;
        tracing::info!(%vehicle_id, "Customer vehicle updated");
        Ok(record.into())
    }

    /// Removes a customer vehicle no order refers to.
    #[tracing::instrument(skip(self))]
    pub async fn delete_customer_vehicle(&self, vehicle_id: CustomerVehicleId) -> Result<()> {
        self.store.delete_customer_vehicle(vehicle_id).await?;
        tracing::info!(%vehicle_id, "Customer vehicle deleted");
        Ok(())
    }

    /// Registers a user.
    #[tracing::instrument(skip(self, draft), fields(role = %draft.role))]
    pub async fn register_user(&self, draft: UserDraft) -> Result<UserView> {
        let record = self
            .store
            .insert_user(NewUser {
                id: UserId::new(),
                email: draft.email,
                first_name: draft.first_name,
                last_name: draft.last_name,
                patronymic: draft.patronymic,
                role: draft.role,
                notify_on_completion: draft.notify_on_completion,
            })
            .await?;
        tracing::info!(user_id = %record.id, "User registered");
        Ok(record.into())
    }

    /// Loads a user, typically the caller.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, user_id: UserId) -> Result<UserView> {
        let record = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| OrderError::not_found("user", user_id))?;
        Ok(record.into())
    }

    /// Lists users by email.
    #[tracing::instrument(skip(self))]
    pub async fn list_users(&self, skip: usize, limit: usize) -> Result<Page<UserView>> {
        let (records, total_count) = self.store.list_users(skip, limit).await?;
        Ok(Page {
            total_count,
            items: records.into_iter().map(UserView::from).collect(),
        })
    }

    /// Removes a user who owns no vehicle and staffs no order.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: UserId) -> Result<()> {
        self.store.delete_user(user_id).await?;
        tracing::info!(%user_id, "User deleted");
        Ok(())
    }
}
