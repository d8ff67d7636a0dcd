//! End-to-end order placement scenarios, including concurrent contention
//! for limited stock.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use clementine_core::{Price, ProductId, UserId};

use clementine_commerce::error::CommerceError;
use clementine_commerce::ledger::MemoryLedger;

use clementine_integration_tests::{customer, line, placement_service, product, request};

#[tokio::test]
async fn place_order_from_cart_end_to_end() {
    let ledger = MemoryLedger::new();
    ledger.insert_product(product(1, 1299, 10)).await;
    ledger.insert_product(product(2, 550, 8)).await;
    ledger
        .set_cart(UserId::new(7), vec![line(1, 2), line(2, 1)])
        .await;

    let service = placement_service(&ledger);
    let order = service
        .place_order(&customer(7), request(vec![]))
        .await
        .unwrap();

    // Total is the exact sum of line totals.
    assert_eq!(order.total_amount, Price::from_cents(2 * 1299 + 550));
    assert!(order.invoice_ref.is_some());
    // The buyer's email is snapshotted for notifications.
    assert_eq!(order.customer_email.as_str(), "customer7@example.com");

    // Stock came down, the cart is gone, the items are recorded.
    assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 8);
    assert_eq!(ledger.product(ProductId::new(2)).await.unwrap().stock, 7);
    assert!(ledger.cart_lines(UserId::new(7)).await.is_empty());

    let items = ledger.order_items(order.id).await;
    assert_eq!(items.len(), 2);
    let items_total: Price = items.iter().map(|item| item.line_total).sum();
    assert_eq!(items_total, order.total_amount);
}

#[tokio::test]
async fn decimal_totals_are_exact() {
    let ledger = MemoryLedger::new();
    // 0.10 * 3 must be exactly 0.30, not a float approximation.
    ledger.insert_product(product(1, 10, 100)).await;

    let service = placement_service(&ledger);
    let order = service
        .place_order(&customer(1), request(vec![line(1, 3)]))
        .await
        .unwrap();

    assert_eq!(order.total_amount, Price::from_cents(30));
    assert_eq!(order.total_amount.to_string(), "0.30");
}

#[tokio::test]
async fn failed_placement_restores_nothing_it_did_not_take() {
    let ledger = MemoryLedger::new();
    ledger.insert_product(product(1, 1000, 5)).await;
    ledger.insert_product(product(2, 1000, 0)).await;
    ledger
        .set_cart(UserId::new(1), vec![line(1, 3), line(2, 1)])
        .await;

    let service = placement_service(&ledger);
    let err = service
        .place_order(&customer(1), request(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::InsufficientStock { .. }));

    // Nothing committed: stock intact, cart intact, no orders.
    assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 5);
    assert_eq!(ledger.cart_lines(UserId::new(1)).await.len(), 2);
    assert!(ledger.orders().await.is_empty());
}

#[tokio::test]
async fn concurrent_buyers_cannot_oversell_the_last_unit() {
    let ledger = MemoryLedger::new();
    ledger.insert_product(product(1, 2500, 1)).await;

    let service = Arc::new(placement_service(&ledger));

    let a = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.place_order(&customer(1), request(vec![line(1, 1)])).await }
    });
    let b = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.place_order(&customer(2), request(vec![line(1, 1)])).await }
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(CommerceError::InsufficientStock { .. })
    )));

    assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 0);
    assert_eq!(ledger.orders().await.len(), 1);
}

#[tokio::test]
async fn committed_quantities_never_exceed_initial_stock() {
    let ledger = MemoryLedger::new();
    let initial_stock = 5;
    ledger.insert_product(product(1, 900, initial_stock)).await;

    let service = Arc::new(placement_service(&ledger));

    let mut handles = Vec::new();
    for buyer in 1..=12 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .place_order(&customer(buyer), request(vec![line(1, 1)]))
                .await
        }));
    }

    let mut successes = 0_i32;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, initial_stock);
    assert_eq!(ledger.product(ProductId::new(1)).await.unwrap().stock, 0);

    // Every committed order item adds up to exactly the initial stock.
    let mut committed = 0;
    for order in ledger.orders().await {
        for item in ledger.order_items(order.id).await {
            committed += item.quantity;
        }
    }
    assert_eq!(committed, initial_stock);
}

#[tokio::test]
async fn explicit_lines_bypass_the_cart() {
    let ledger = MemoryLedger::new();
    ledger.insert_product(product(1, 100, 10)).await;
    ledger.insert_product(product(2, 200, 10)).await;
    ledger.set_cart(UserId::new(1), vec![line(2, 4)]).await;

    let service = placement_service(&ledger);
    let order = service
        .place_order(&customer(1), request(vec![line(1, 1)]))
        .await
        .unwrap();

    assert_eq!(order.total_amount, Price::from_cents(100));
    // The cart was not consumed.
    assert_eq!(ledger.cart_lines(UserId::new(1)).await.len(), 1);
    assert_eq!(ledger.product(ProductId::new(2)).await.unwrap().stock, 10);
}
