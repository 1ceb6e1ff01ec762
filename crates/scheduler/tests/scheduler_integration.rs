//! The scheduler driving a real order service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use domain::{CreateOrder, InMemoryDispatcher, ManualClock, OrderService};
use scheduler::SweepScheduler;
use store::{
    BrandId, CarModelId, CatalogStore, CustomerVehicleId, InMemoryOrderStore, NewBrand,
    NewCarModel, NewCustomerVehicle, NewService, NewUser, OrderRepository, OrderStatus, Role,
    ServiceId, UserId,
};

#[tokio::test(start_paused = true)]
async fn scheduled_sweep_completes_due_order() {
    let store = InMemoryOrderStore::new();
    let owner = store
        .insert_user(NewUser {
            id: UserId::new(),
            email: "owner@mail.test".to_string(),
            first_name: "Oleg".to_string(),
            last_name: "Popov".to_string(),
            patronymic: String::new(),
            role: Role::Customer,
            notify_on_completion: true,
        })
        .await
        .unwrap();
    let brand = store
        .insert_brand(NewBrand {
            id: BrandId::new(),
            name: "Audi".to_string(),
        })
        .await
        .unwrap();
    let model = store
        .insert_car_model(NewCarModel {
            id: CarModelId::new(),
            model: "A4".to_string(),
            brand_id: brand.id,
        })
        .await
        .unwrap();
    let vehicle = store
        .insert_customer_vehicle(NewCustomerVehicle {
            id: CustomerVehicleId::new(),
            car_model_id: model.id,
            owner_id: owner.id,
            year: 2015,
            number: "О555ОО55".to_string(),
        })
        .await
        .unwrap();
    let wash = store
        .insert_service(NewService {
            id: ServiceId::new(),
            name: "Wash".to_string(),
            price_minor_units: 30_000,
            duration_seconds: 60,
        })
        .await
        .unwrap();

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap());
    let dispatcher = InMemoryDispatcher::new();
    let service = Arc::new(
        OrderService::new(store.clone(), Arc::new(dispatcher.clone()))
            .with_clock(Arc::new(clock.clone())),
    );
    let order = service
        .create(CreateOrder::new(vehicle.id, owner.id, owner.id).with_services([wash.id]))
        .await
        .unwrap();

    let handle = SweepScheduler::start(service.clone(), Duration::from_secs(120));
    clock.advance(chrono::Duration::minutes(2));
    tokio::time::sleep(Duration::from_secs(121)).await;
    handle.shutdown().await;

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(dispatcher.sent_count(), 1);
}
