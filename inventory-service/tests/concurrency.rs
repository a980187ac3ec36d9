use inventory_service::models::{MovementType, StockStatus};
use inventory_service::{InMemoryStore, InventoryError, InventoryStore, ReservationEngine};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_reservations_never_oversell() {
    let store = InMemoryStore::new();
    let product_id = Uuid::new_v4();
    store.insert(product_id, 100, 10);
    let engine = ReservationEngine::new(Arc::new(store.clone()));

    let mut handles = Vec::new();
    for i in 0..64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let quantity = 1 + (i % 5);
            engine
                .reserve(product_id, quantity, Uuid::new_v4())
                .await
                .map(|_| quantity)
        }));
    }

    let mut granted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(quantity) => granted += quantity,
            Err(InventoryError::InsufficientStock { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let inventory = store.get_by_product_id(product_id).await.unwrap();
    assert!(granted <= 100);
    assert_eq!(inventory.reserved_qty, granted);
    assert!(inventory.available_qty >= 0);
    // 64 requests averaging 3 units cannot all fit into 100.
    assert!(rejected > 0);

    let movements = store.movements(product_id).await.unwrap();
    assert_eq!(movements.len(), 64 - rejected);
    assert!(movements.iter().all(|m| m.movement_type == MovementType::Reserve));
    assert_eq!(movements.iter().map(|m| m.quantity).sum::<i32>(), granted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_products_do_not_interfere() {
    let store = InMemoryStore::new();
    let products: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for product_id in &products {
        store.insert(*product_id, 20, 0);
    }
    let engine = ReservationEngine::new(Arc::new(store.clone()));

    let mut handles = Vec::new();
    for product_id in products.clone() {
        for _ in 0..20 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.reserve(product_id, 1, Uuid::new_v4()).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for product_id in products {
        let inventory = store.get_by_product_id(product_id).await.unwrap();
        assert_eq!(inventory.reserved_qty, 20);
        assert_eq!(inventory.status, StockStatus::OutOfStock);
    }
}

#[tokio::test]
async fn test_every_mutation_appends_one_matching_movement() {
    let store = InMemoryStore::new();
    let product_id = Uuid::new_v4();
    store.insert(product_id, 10, 2);
    let engine = ReservationEngine::new(Arc::new(store.clone()));
    let order_id = Uuid::new_v4();

    engine.add_stock(product_id, 5, "restock").await.unwrap();
    assert_eq!(store.movements(product_id).await.unwrap().len(), 1);

    engine.reserve(product_id, 6, order_id).await.unwrap();
    assert_eq!(store.movements(product_id).await.unwrap().len(), 2);

    engine.release(product_id, 2, order_id).await.unwrap();
    assert_eq!(store.movements(product_id).await.unwrap().len(), 3);

    engine.remove_stock(product_id, 1, "damaged").await.unwrap();
    let movements = store.movements(product_id).await.unwrap();
    assert_eq!(movements.len(), 4);

    let summary: Vec<_> = movements
        .iter()
        .map(|m| (m.movement_type, m.quantity, m.order_id))
        .collect();
    assert_eq!(
        summary,
        vec![
            (MovementType::In, 5, None),
            (MovementType::Reserve, 6, Some(order_id)),
            (MovementType::Release, 2, Some(order_id)),
            (MovementType::Out, 1, None),
        ]
    );

    let inventory = store.get_by_product_id(product_id).await.unwrap();
    assert_eq!(inventory.quantity, 14);
    assert_eq!(inventory.reserved_qty, 4);
    assert_eq!(inventory.available_qty, 10);
}
