//! Integration tests for the full movement pipeline.
//!
//! Tests: MovementProcessor → LedgerStore (in-memory) → committed state
//!
//! Verifies:
//! - The denormalized counter always reconciles with the movement history
//! - No committed outbound movement ever drives stock negative
//! - Rejections leave stock and the ledger unchanged
//! - Concurrent outbound movements on one product never double-spend stock

use std::sync::Arc;

use tokio::sync::Barrier;

use stockbook_core::{LedgerError, ProductId};
use stockbook_ledger::{Direction, NewProduct, reconcile};

use crate::ledger_store::{InMemoryLedgerStore, LedgerStore};
use crate::processor::MovementProcessor;

fn setup() -> (MovementProcessor<Arc<InMemoryLedgerStore>>, Arc<InMemoryLedgerStore>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    (MovementProcessor::new(store.clone()), store)
}

fn product(name: &str, initial_stock: i64) -> NewProduct {
    NewProduct {
        sku: format!("SKU-{name}"),
        name: name.to_string(),
        description: None,
        category: None,
        price_cents: Some(500),
        initial_stock,
    }
}

#[tokio::test]
async fn inbound_then_outbound_scenario() {
    let (processor, store) = setup();
    let p = store.insert_product(product("widget", 0)).await.unwrap();

    let committed = processor.record_inbound(p.id(), 5).await.unwrap();
    assert_eq!(committed.new_stock, 5);
    assert_eq!(committed.movement.direction, Direction::Inbound);
    assert_eq!(committed.movement.quantity, 5);

    let committed = processor.record_outbound(p.id(), 3).await.unwrap();
    assert_eq!(committed.new_stock, 2);

    let err = processor.record_outbound(p.id(), 5).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 5,
            available: 2
        }
    );
    assert_eq!(processor.stock_on_hand(p.id()).await.unwrap(), 2);

    let movements = processor.list_movements(Some(p.id())).await.unwrap();
    assert_eq!(movements.len(), 2, "rejected movement must not be logged");
}

#[tokio::test]
async fn invalid_quantity_logs_nothing() {
    let (processor, store) = setup();
    let p = store.insert_product(product("widget", 10)).await.unwrap();

    for qty in [0, -1] {
        assert_eq!(
            processor.record_inbound(p.id(), qty).await.unwrap_err(),
            LedgerError::InvalidQuantity(qty)
        );
        assert_eq!(
            processor.record_outbound(p.id(), qty).await.unwrap_err(),
            LedgerError::InvalidQuantity(qty)
        );
    }

    assert!(processor.list_movements(Some(p.id())).await.unwrap().is_empty());
    assert_eq!(processor.stock_on_hand(p.id()).await.unwrap(), 10);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let (processor, _store) = setup();
    let missing = ProductId::new();

    assert_eq!(
        processor.record_outbound(missing, 1).await.unwrap_err(),
        LedgerError::NotFound
    );
    assert_eq!(
        processor.record_inbound(missing, 1).await.unwrap_err(),
        LedgerError::NotFound
    );
}

#[tokio::test]
async fn zero_stock_product_is_found_not_missing() {
    let (processor, store) = setup();
    let p = store.insert_product(product("empty", 0)).await.unwrap();

    // A product legitimately at zero stock is found and checked against the
    // requested quantity, never reported as NotFound.
    let err = processor.record_outbound(p.id(), 1).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 1,
            available: 0
        }
    );
}

#[tokio::test]
async fn rejected_outbound_leaves_state_unchanged() {
    let (processor, store) = setup();
    let p = store.insert_product(product("widget", 4)).await.unwrap();
    processor.record_inbound(p.id(), 1).await.unwrap();

    let stock_before = processor.stock_on_hand(p.id()).await.unwrap();
    let ledger_before = processor.list_movements(Some(p.id())).await.unwrap();

    let err = processor.record_outbound(p.id(), 100).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));

    assert_eq!(processor.stock_on_hand(p.id()).await.unwrap(), stock_before);
    assert_eq!(
        processor.list_movements(Some(p.id())).await.unwrap(),
        ledger_before
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_outbounds_never_double_spend() {
    let (processor, store) = setup();
    let p = store.insert_product(product("contended", 10)).await.unwrap();

    let processor = Arc::new(processor);
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let processor = processor.clone();
        let barrier = barrier.clone();
        let product_id = p.id();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            processor.record_outbound(product_id, 6).await
        }));
    }

    let mut successes = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(committed) => {
                successes += 1;
                assert_eq!(committed.new_stock, 4);
            }
            Err(LedgerError::InsufficientStock { requested: 6, .. }) => insufficient += 1,
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    assert_eq!(successes, 1, "exactly one concurrent outbound may win");
    assert_eq!(insufficient, 1);
    assert_eq!(processor.stock_on_hand(p.id()).await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn contended_drain_stops_exactly_at_zero() {
    let (processor, store) = setup();
    let p = store.insert_product(product("drain", 25)).await.unwrap();

    let processor = Arc::new(processor);
    let attempts = 40;
    let barrier = Arc::new(Barrier::new(attempts));

    let mut handles = Vec::new();
    for _ in 0..attempts {
        let processor = processor.clone();
        let barrier = barrier.clone();
        let product_id = p.id();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            processor.record_outbound(product_id, 1).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(committed) => {
                successes += 1;
                assert!(committed.new_stock >= 0);
            }
            Err(LedgerError::InsufficientStock { available: 0, .. }) => {}
            Err(other) => panic!("unexpected failure: {other:?}"),
        }
    }

    assert_eq!(successes, 25, "every unit of stock is spent exactly once");
    assert_eq!(processor.stock_on_hand(p.id()).await.unwrap(), 0);
    assert_eq!(
        processor.list_movements(Some(p.id())).await.unwrap().len(),
        25
    );
}

#[tokio::test]
async fn counter_reconciles_with_movement_history() {
    let (processor, store) = setup();
    let initial = 8;
    let p = store.insert_product(product("widget", initial)).await.unwrap();

    processor.record_inbound(p.id(), 12).await.unwrap();
    processor.record_outbound(p.id(), 5).await.unwrap();
    processor.record_inbound(p.id(), 1).await.unwrap();
    processor.record_outbound(p.id(), 16).await.unwrap();
    // A rejection must not disturb the reconciliation.
    let _ = processor.record_outbound(p.id(), 100).await.unwrap_err();

    let movements = processor.list_movements(Some(p.id())).await.unwrap();
    let stock = processor.stock_on_hand(p.id()).await.unwrap();

    assert_eq!(stock, reconcile(initial, &movements));
    assert_eq!(stock, 0);
    assert!(stock >= 0);
}

#[tokio::test]
async fn list_movements_orders_newest_first() {
    let (processor, store) = setup();
    let p = store.insert_product(product("widget", 0)).await.unwrap();

    let quantities = [5, 2, 7];
    for qty in quantities {
        processor.record_inbound(p.id(), qty).await.unwrap();
        // Distinct commit timestamps make the ordering assertion strict.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let committed = processor.record_outbound(p.id(), 3).await.unwrap();

    let movements = processor.list_movements(Some(p.id())).await.unwrap();
    assert_eq!(movements.len(), 4);

    // Newest first, and the head is the movement the commit receipt names.
    assert_eq!(movements[0].id, committed.movement_id());
    assert_eq!(movements[0].direction, Direction::Outbound);
    assert_eq!(movements[0].quantity, 3);
    for (movement, qty) in movements[1..].iter().zip(quantities.iter().rev()) {
        assert_eq!(movement.direction, Direction::Inbound);
        assert_eq!(movement.quantity, *qty);
    }
    for pair in movements.windows(2) {
        assert!(pair[0].recorded_at >= pair[1].recorded_at);
    }
}

#[tokio::test]
async fn global_listing_interleaves_products() {
    let (processor, store) = setup();
    let a = store.insert_product(product("alpha", 0)).await.unwrap();
    let b = store.insert_product(product("beta", 0)).await.unwrap();

    processor.record_inbound(a.id(), 1).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    processor.record_inbound(b.id(), 2).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    processor.record_inbound(a.id(), 3).await.unwrap();

    let all = processor.list_movements(None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(
        all.iter().map(|m| m.quantity).collect::<Vec<_>>(),
        vec![3, 2, 1]
    );
    assert_eq!(all[0].product_id, a.id());
    assert_eq!(all[1].product_id, b.id());

    // Scoped listings only see their own product.
    assert_eq!(processor.list_movements(Some(b.id())).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_products_move_in_parallel() {
    let (processor, store) = setup();
    let mut ids = Vec::new();
    for i in 0..8 {
        let p = store
            .insert_product(product(&format!("p{i}"), 100))
            .await
            .unwrap();
        ids.push(p.id());
    }

    let processor = Arc::new(processor);
    let mut handles = Vec::new();
    for &product_id in &ids {
        let processor = processor.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                processor.record_outbound(product_id, 1).await.unwrap();
                processor.record_inbound(product_id, 1).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for product_id in ids {
        assert_eq!(processor.stock_on_hand(product_id).await.unwrap(), 100);
        let movements = processor.list_movements(Some(product_id)).await.unwrap();
        assert_eq!(movements.len(), 40);
        assert_eq!(reconcile(100, &movements), 100);
    }
}
