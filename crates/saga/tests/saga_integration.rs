//! Integration tests for the checkout saga over in-memory queues and store.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use common::{CustomerId, ItemId, TransactionId};
use domain::{
    Address, CartLineItem, Customer, InventoryAdjustment, Money, Order, OrderStatus,
    PaymentStatus, PaymentStatusMessage, Receipt, Repository, ShippingDimensions, StoreItem,
    TableNames,
};
use queue::{InMemoryQueueTransport, InMemoryTopic, QueueClient, RetryPolicy};
use record_store::InMemoryRecordStore;
use saga::{CheckoutOutcome, ErrorKind, PaymentRequest, SagaComponents, SagaConfig, SagaError};

type TestSaga = SagaComponents<InMemoryRecordStore, InMemoryQueueTransport, InMemoryTopic>;

struct TestHarness {
    saga: TestSaga,
    repository: Repository<InMemoryRecordStore>,
    queues: InMemoryQueueTransport,
    topic: InMemoryTopic,
    config: SagaConfig,
    customer_id: CustomerId,
}

impl TestHarness {
    async fn new() -> Self {
        let config = SagaConfig {
            retry: RetryPolicy::immediate(2),
            ..SagaConfig::default()
        };
        let names = &config.queues;
        let queues = InMemoryQueueTransport::with_queues(&[
            names.staging.as_str(),
            names.payment_status.as_str(),
            names.inventory_update.as_str(),
        ])
        .await;
        let topic = InMemoryTopic::new();
        let repository = Repository::new(InMemoryRecordStore::new(), TableNames::default());

        let customer_id = CustomerId::new("cus_1");
        let mut customer = Customer::new(
            customer_id.clone(),
            "ada@example.com",
            "Ada",
            "Lovelace",
            Utc::now(),
        );
        customer.shipping_address = address();
        repository.put_customer(&customer).await.unwrap();

        let saga = SagaComponents::build(repository.clone(), queues.clone(), topic.clone(), &config);

        Self {
            saga,
            repository,
            queues,
            topic,
            config,
            customer_id,
        }
    }

    async fn stock(&self, item_id: &str, units: i64) {
        self.repository
            .put_store_item(&StoreItem {
                item_id: ItemId::new(item_id),
                name: item_id.to_string(),
                category: "apparel".to_string(),
                subcategory: "tops".to_string(),
                price: Money::from_cents(2000),
                units_available: BTreeMap::from([("m".to_string(), units)]),
                units_sold: 0,
                applied_adjustments: BTreeMap::new(),
            })
            .await
            .unwrap();
    }

    async fn units(&self, item_id: &str) -> i64 {
        self.repository
            .units_available("tops", &ItemId::new(item_id), "m")
            .await
            .unwrap()
    }

    async fn open(&self, items: Vec<CartLineItem>, now: DateTime<Utc>) -> Order {
        self.saga
            .checkout
            .open_order(&self.customer_id, items, now)
            .await
            .unwrap()
    }

    fn payment_request(&self, order: &Order) -> PaymentRequest {
        PaymentRequest {
            customer_id: self.customer_id.clone(),
            order_id: order.order_id.clone(),
            shipping_address: None,
            billing_address: None,
            save_addresses: false,
        }
    }

    /// Opens, pays and stages an order, returning the receipt.
    async fn staged_order(&self, items: Vec<CartLineItem>) -> Receipt {
        let order = self.open(items, Utc::now()).await;
        let outcome = self
            .saga
            .checkout
            .submit_payment(self.payment_request(&order), Utc::now())
            .await
            .unwrap();
        let CheckoutOutcome::Staged(receipt) = outcome else {
            panic!("expected staged checkout, got {outcome:?}");
        };
        let report = self.saga.staging.drain_staged().await.unwrap();
        assert_eq!(report.applied, 1);
        receipt
    }

    fn status_message(&self, receipt: &Receipt, status: &str) -> PaymentStatusMessage {
        PaymentStatusMessage {
            customer_email: receipt.customer_email.clone(),
            customer_id: receipt.customer_id.clone(),
            order_id: receipt.order_id.clone(),
            transaction_id: receipt.transaction_id.clone(),
            payment_method: "card".to_string(),
            provider_tx_id: "ch_123".to_string(),
            status: status.to_string(),
            status_message: String::new(),
        }
    }

    fn raw_client(&self) -> QueueClient<InMemoryQueueTransport> {
        QueueClient::new(self.queues.clone(), RetryPolicy::immediate(0))
    }

    async fn order(&self, receipt: &Receipt) -> Order {
        self.repository
            .require_order(&receipt.customer_id, &receipt.order_id)
            .await
            .unwrap()
    }

    async fn published_orders(&self) -> Vec<Order> {
        self.topic
            .published(&self.config.queues.fulfillment_topic)
            .await
            .iter()
            .map(|m| serde_json::from_str(&m.body).unwrap())
            .collect()
    }
}

fn address() -> Address {
    Address {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        address_line_1: "12 Analytical Way".to_string(),
        city: "London".to_string(),
        state: "LDN".to_string(),
        country: "GB".to_string(),
        zip: "N1 9GU".to_string(),
        ..Default::default()
    }
}

fn line(item_id: &str, quantity: u32) -> CartLineItem {
    CartLineItem {
        category: "apparel".to_string(),
        subcategory: "tops".to_string(),
        item_id: ItemId::new(item_id),
        size: "M".to_string(),
        name: item_id.to_string(),
        quantity,
        unit_price: Money::from_cents(2000),
        dimensions: ShippingDimensions {
            length: 10.0,
            width: 8.0,
            height: 1.0,
            weight: 6.0,
            ..Default::default()
        },
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn test_open_order_numbers_and_prices_the_order() {
        let h = TestHarness::new().await;

        let first = h.open(vec![line("tee", 2)], Utc::now()).await;
        let second = h.open(vec![line("tee", 1)], Utc::now()).await;

        assert_eq!(first.order_id.as_str(), "cus_1-1");
        assert_eq!(second.order_id.as_str(), "cus_1-2");
        assert_eq!(first.order_status, OrderStatus::Open);
        assert_eq!(first.ttl_ms, 600_000);
        assert_eq!(first.shipping_address, address());
        // 40.00 * 0.0725 = 2.90
        assert_eq!(first.totals.sales_tax.cents(), 290);
        assert_eq!(first.totals.order_total.cents(), 4290);

        let customer = h.repository.require_customer(&h.customer_id).await.unwrap();
        assert_eq!(customer.orders, 2);
        assert!(customer.open_order);
    }

    #[tokio::test]
    async fn test_open_order_for_unknown_customer_is_not_found() {
        let h = TestHarness::new().await;

        let err = h
            .saga
            .checkout
            .open_order(&CustomerId::new("nobody"), vec![line("tee", 1)], Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_submit_payment_reserves_and_stages() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        h.stock("hoodie", 2).await;
        let order = h.open(vec![line("tee", 2), line("hoodie", 2)], Utc::now()).await;

        let outcome = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();

        let CheckoutOutcome::Staged(receipt) = outcome else {
            panic!("expected staged checkout");
        };
        assert_eq!(receipt.customer_name, "Ada Lovelace");
        assert_eq!(receipt.totals, order.totals);
        assert_eq!(receipt.billing_address, receipt.shipping_address);
        assert_eq!(h.units("tee").await, 3);
        assert_eq!(h.units("hoodie").await, 0);

        // The order is claimed, but the staged records wait for the drain.
        let claimed = h.order(&receipt).await;
        assert_eq!(claimed.order_status, OrderStatus::PaymentInProgress);
        assert_eq!(claimed.transaction_id, None);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 1);

        let report = h.saga.staging.drain_staged().await.unwrap();
        assert_eq!(report.applied, 1);

        let staged = h.order(&receipt).await;
        assert_eq!(staged.order_status, OrderStatus::PaymentInProgress);
        assert_eq!(staged.transaction_id, Some(receipt.transaction_id.clone()));
        let transaction = h
            .repository
            .get_transaction(&receipt.order_id, &receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transaction.payment_status, PaymentStatus::InProgress);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 0);
    }

    #[tokio::test]
    async fn test_submit_payment_twice_is_rejected_once_staged() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 1)]).await;
        let order = h.order(&receipt).await;

        let err = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SagaError::InvalidOrderState {
                status: OrderStatus::PaymentInProgress,
                ..
            }
        ));
        assert_eq!(h.units("tee").await, 4);
    }

    #[tokio::test]
    async fn test_second_submit_before_drain_reserves_nothing() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 2)], Utc::now()).await;

        let first = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();
        let second = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now() + Duration::seconds(1))
            .await
            .unwrap_err();

        assert!(matches!(first, CheckoutOutcome::Staged(_)));
        assert!(matches!(
            second,
            SagaError::InvalidOrderState {
                status: OrderStatus::PaymentInProgress,
                ..
            }
        ));
        assert_eq!(second.kind(), ErrorKind::InvalidState);
        assert_eq!(h.units("tee").await, 3);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 1);

        let report = h.saga.staging.drain_staged().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(h.units("tee").await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_submits_reserve_once() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 2)], Utc::now()).await;
        let checkout = &h.saga.checkout;

        let (a, b) = tokio::join!(
            checkout.submit_payment(h.payment_request(&order), Utc::now()),
            checkout.submit_payment(h.payment_request(&order), Utc::now()),
        );

        let staged = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Ok(CheckoutOutcome::Staged(_))))
            .count();
        assert_eq!(staged, 1);
        assert!([a, b].into_iter().any(|r| matches!(r, Err(SagaError::InvalidOrderState { .. }))));
        assert_eq!(h.units("tee").await, 3);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 1);
    }

    #[tokio::test]
    async fn test_expired_order_is_not_reserved() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let opened_at = Utc::now();
        let order = h.open(vec![line("tee", 1)], opened_at).await;

        let outcome = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), opened_at + Duration::seconds(601))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::Expired {
                order_id: order.order_id
            }
        );
        assert_eq!(h.units("tee").await, 5);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 0);
    }

    #[tokio::test]
    async fn test_supplied_addresses_are_saved_on_request() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 1)], Utc::now()).await;
        let billing = Address {
            address_line_1: "1 Billing Rd".to_string(),
            ..address()
        };

        let mut request = h.payment_request(&order);
        request.billing_address = Some(billing.clone());
        request.save_addresses = true;
        let outcome = h
            .saga
            .checkout
            .submit_payment(request, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Staged(_)));
        h.saga.staging.drain_staged().await.unwrap();

        let customer = h.repository.require_customer(&h.customer_id).await.unwrap();
        assert_eq!(customer.billing_address, billing);
        assert_eq!(customer.shipping_address, address());
    }

    #[tokio::test]
    async fn test_staging_failure_gives_stock_back() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 2)], Utc::now()).await;
        // Exhausts the three staging attempts; the compensation send succeeds.
        h.queues.fail_next_sends(3).await;

        let err = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(h.units("tee").await, 3);
        assert_eq!(
            h.queues
                .message_count(&h.config.queues.inventory_update)
                .await,
            1
        );

        let report = h.saga.adjustments.apply_pending().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(h.units("tee").await, 5);

        // The order is open again and can be paid once the queue recovers.
        assert_eq!(
            h.repository
                .require_order(&h.customer_id, &order.order_id)
                .await
                .unwrap()
                .order_status,
            OrderStatus::Open
        );
        let retry = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();
        assert!(matches!(retry, CheckoutOutcome::Staged(_)));
        assert_eq!(h.units("tee").await, 3);
    }

    #[tokio::test]
    async fn test_report_payment_status_rejects_unknown_status() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 1)]).await;

        let err = h
            .saga
            .checkout
            .report_payment_status(&h.status_message(&receipt, "ALMOST_PAID"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert_eq!(
            h.queues.message_count(&h.config.queues.payment_status).await,
            0
        );
    }
}

mod reservation {
    use super::*;

    #[tokio::test]
    async fn test_insufficient_stock_reports_item_without_decrementing() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        h.stock("x", 1).await;
        let order = h.open(vec![line("tee", 1), line("x", 3)], Utc::now()).await;

        let outcome = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CheckoutOutcome::OutOfStock {
                order_id: order.order_id.clone(),
                items: vec![ItemId::new("x")],
            }
        );
        assert_eq!(h.units("x").await, 1);
        assert_eq!(h.units("tee").await, 5);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 0);
        assert_eq!(
            h.repository
                .require_order(&h.customer_id, &order.order_id)
                .await
                .unwrap()
                .order_status,
            OrderStatus::Open
        );
    }

    #[tokio::test]
    async fn test_stock_lost_mid_reservation_restores_exact_totals() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        h.stock("x", 1).await;
        // Both "x" lines pass the check against the single unit; the second
        // decrement is rejected after "tee" and the first "x" succeeded.
        let order = h
            .open(vec![line("tee", 2), line("x", 1), line("x", 1)], Utc::now())
            .await;

        let outcome = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            CheckoutOutcome::OutOfStock { ref items, .. } if items == &vec![ItemId::new("x")]
        ));
        assert_eq!(h.units("tee").await, 3);
        assert_eq!(h.units("x").await, 0);

        let bodies = h
            .queues
            .bodies(&h.config.queues.inventory_update)
            .await;
        assert_eq!(bodies.len(), 1);
        let adjustment: InventoryAdjustment = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(adjustment.total_units(), 3);

        h.saga.adjustments.apply_pending().await.unwrap();
        assert_eq!(h.units("tee").await, 5);
        assert_eq!(h.units("x").await, 1);
    }
}

mod staging {
    use super::*;

    #[tokio::test]
    async fn test_idle_queue_is_not_an_error() {
        let h = TestHarness::new().await;

        let report = h.saga.staging.drain_staged().await.unwrap();

        assert!(report.is_idle());
    }

    #[tokio::test]
    async fn test_redelivered_batch_is_reapplied_harmlessly() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 1)], Utc::now()).await;
        h.saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();

        h.queues.fail_next_deletes(3).await;
        let err = h.saga.staging.drain_staged().await.unwrap_err();
        assert!(matches!(err, SagaError::AckFailed { .. }));

        let store = h.repository.store();
        let orders = store.record_count("orders").await;
        let transactions = store.record_count("transactions").await;
        let first_apply = h.repository.require_order(&h.customer_id, &order.order_id).await.unwrap();

        h.queues.expire_in_flight(&h.config.queues.staging).await;
        let report = h.saga.staging.drain_staged().await.unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(store.record_count("orders").await, orders);
        assert_eq!(store.record_count("transactions").await, transactions);
        assert_eq!(
            h.repository.require_order(&h.customer_id, &order.order_id).await.unwrap(),
            first_apply
        );
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 0);
    }

    #[tokio::test]
    async fn test_stale_copy_does_not_reopen_a_paid_order() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 1)], Utc::now()).await;
        let outcome = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();
        let CheckoutOutcome::Staged(receipt) = outcome else {
            panic!("expected staged checkout");
        };

        // Applied, but the delete fails and the message comes back later.
        h.queues.fail_next_deletes(3).await;
        h.saga.staging.drain_staged().await.unwrap_err();
        h.saga
            .checkout
            .report_payment_status(&h.status_message(&receipt, "PAYMENT_SUCCESS"))
            .await
            .unwrap();
        h.saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();

        h.queues.expire_in_flight(&h.config.queues.staging).await;
        let report = h.saga.staging.drain_staged().await.unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(report.duplicates, 1);
        let order = h.order(&receipt).await;
        assert_eq!(order.order_status, OrderStatus::Paid);
        assert_eq!(order.payment_status, Some(PaymentStatus::PaymentSuccess));
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped_with_the_batch() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        h.raw_client()
            .send_json(&h.config.queues.staging, &serde_json::json!({"order": "garbage"}))
            .await
            .unwrap();
        let order = h.open(vec![line("tee", 1)], Utc::now()).await;
        h.saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();

        let report = h.saga.staging.drain_staged().await.unwrap();

        assert_eq!(report.received, 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(h.queues.message_count(&h.config.queues.staging).await, 0);
    }

    #[tokio::test]
    async fn test_store_outage_releases_the_batch() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 1)], Utc::now()).await;
        h.saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();

        h.repository.store().set_unavailable(true);
        let err = h.saga.staging.drain_staged().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(h.queues.in_flight_count(&h.config.queues.staging).await, 0);

        h.repository.store().set_unavailable(false);
        let report = h.saga.staging.drain_staged().await.unwrap();
        assert_eq!(report.applied, 1);
    }
}

mod payment_status {
    use super::*;

    #[tokio::test]
    async fn test_success_marks_paid_and_notifies_once_despite_redelivery() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 2)]).await;
        let message = h.status_message(&receipt, "PAYMENT_SUCCESS");
        h.saga.checkout.report_payment_status(&message).await.unwrap();

        // First delivery: applied, but the delete fails.
        h.queues.fail_next_deletes(3).await;
        let err = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::AckFailed { .. }));
        assert_eq!(h.order(&receipt).await.order_status, OrderStatus::Paid);

        // Second delivery of the same message.
        h.queues
            .expire_in_flight(&h.config.queues.payment_status)
            .await;
        let report = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.duplicates, 1);

        // Third delivery: the provider sends the same status again.
        h.raw_client()
            .send_json_with_dedup(&h.config.queues.payment_status, &message, "resend-1")
            .await
            .unwrap();
        let report = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();
        assert_eq!(report.duplicates, 1);

        let published = h.published_orders().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].order_id, receipt.order_id);
        assert_eq!(published[0].order_status, OrderStatus::Paid);
        assert_eq!(published[0].payment_status, Some(PaymentStatus::PaymentSuccess));

        let order = h.order(&receipt).await;
        assert_eq!(
            order.notified_payment_status,
            Some(PaymentStatus::PaymentSuccess)
        );
        let transaction = h
            .repository
            .get_transaction(&receipt.order_id, &receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transaction.payment_status, PaymentStatus::PaymentSuccess);
        assert_eq!(transaction.provider_tx_id.as_deref(), Some("ch_123"));

        let customer = h.repository.require_customer(&h.customer_id).await.unwrap();
        assert_eq!(customer.purchases, 1);
        assert_eq!(customer.total_spent, receipt.totals.order_total);
        assert!(!customer.open_order);
        assert_eq!(
            h.queues.message_count(&h.config.queues.payment_status).await,
            0
        );
    }

    #[tokio::test]
    async fn test_failure_restores_reserved_stock_once() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 2)]).await;
        assert_eq!(h.units("tee").await, 3);
        let message = h.status_message(&receipt, "PAYMENT_FAIL");
        h.saga.checkout.report_payment_status(&message).await.unwrap();

        h.saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();
        assert_eq!(h.order(&receipt).await.order_status, OrderStatus::PaymentFailed);

        let report = h.saga.adjustments.apply_pending().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(h.units("tee").await, 5);

        // The same adjustment arriving again is recognised.
        let adjustment = h
            .repository
            .adjustment_applied(&common::content_hash(format!(
                "payment-fail:{}:{}",
                receipt.customer_id, receipt.order_id
            )))
            .await
            .unwrap();
        assert!(adjustment);
        let replay = InventoryAdjustment::new(
            common::content_hash(format!(
                "payment-fail:{}:{}",
                receipt.customer_id, receipt.order_id
            )),
            receipt.order_id.clone(),
            receipt.customer_email.clone(),
            receipt.items.clone(),
        );
        h.raw_client()
            .send_json_with_dedup(&h.config.queues.inventory_update, &replay, "replay")
            .await
            .unwrap();
        let report = h.saga.adjustments.apply_pending().await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(h.units("tee").await, 5);
    }

    #[tokio::test]
    async fn test_late_statuses_do_not_reopen_a_paid_order() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 2)]).await;
        h.saga
            .checkout
            .report_payment_status(&h.status_message(&receipt, "PAYMENT_SUCCESS"))
            .await
            .unwrap();
        h.saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();
        assert_eq!(h.order(&receipt).await.order_status, OrderStatus::Paid);

        for late in ["IN_PROGRESS", "PAYMENT_FAIL"] {
            h.saga
                .checkout
                .report_payment_status(&h.status_message(&receipt, late))
                .await
                .unwrap();
        }
        let report = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(report.duplicates, 2);
        let order = h.order(&receipt).await;
        assert_eq!(order.order_status, OrderStatus::Paid);
        assert_eq!(order.payment_status, Some(PaymentStatus::PaymentSuccess));
        assert_eq!(
            h.queues
                .message_count(&h.config.queues.inventory_update)
                .await,
            0
        );
        assert_eq!(h.units("tee").await, 3);
        assert_eq!(h.published_orders().await.len(), 1);
        let transaction = h
            .repository
            .get_transaction(&receipt.order_id, &receipt.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transaction.payment_status, PaymentStatus::PaymentSuccess);
    }

    #[tokio::test]
    async fn test_invalid_status_fails_the_whole_batch() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 1)]).await;
        let client = h.raw_client();
        let queue = &h.config.queues.payment_status;
        client
            .send_json(queue, &h.status_message(&receipt, "PAYMENT_SUCCESS"))
            .await
            .unwrap();
        client
            .send_json(queue, &h.status_message(&receipt, "MAYBE"))
            .await
            .unwrap();

        let err = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::InvalidPaymentStatus { ref value, .. } if value == "MAYBE"));
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        // Nothing applied, nothing deleted.
        assert_eq!(
            h.order(&receipt).await.order_status,
            OrderStatus::PaymentInProgress
        );
        assert_eq!(h.queues.message_count(queue).await, 2);
        assert!(h.published_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_status_before_staging_waits_for_the_order() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let order = h.open(vec![line("tee", 1)], Utc::now()).await;
        let outcome = h
            .saga
            .checkout
            .submit_payment(h.payment_request(&order), Utc::now())
            .await
            .unwrap();
        let CheckoutOutcome::Staged(receipt) = outcome else {
            panic!("expected staged checkout");
        };
        h.saga
            .checkout
            .report_payment_status(&h.status_message(&receipt, "PAYMENT_SUCCESS"))
            .await
            .unwrap();

        let err = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::OrderNotStaged { .. }));
        assert!(err.is_transient());

        h.saga.staging.drain_staged().await.unwrap();
        let report = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(h.order(&receipt).await.order_status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_not_staged() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 1)]).await;
        let mut message = h.status_message(&receipt, "PAYMENT_SUCCESS");
        message.transaction_id = TransactionId::new("unknown");
        h.saga.checkout.report_payment_status(&message).await.unwrap();

        let err = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::OrderNotStaged { .. }));
        assert_eq!(
            h.order(&receipt).await.order_status,
            OrderStatus::PaymentInProgress
        );
    }

    #[tokio::test]
    async fn test_dispute_keeps_order_status_but_notifies() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 1)]).await;
        for status in ["PAYMENT_SUCCESS", "DISPUTED"] {
            h.saga
                .checkout
                .report_payment_status(&h.status_message(&receipt, status))
                .await
                .unwrap();
        }

        let report = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();

        assert_eq!(report.applied, 2);
        let order = h.order(&receipt).await;
        assert_eq!(order.order_status, OrderStatus::Paid);
        assert_eq!(order.payment_status, Some(PaymentStatus::Disputed));
        assert_eq!(h.published_orders().await.len(), 2);
    }

    #[tokio::test]
    async fn test_publish_failure_retries_on_next_poll() {
        let h = TestHarness::new().await;
        h.stock("tee", 5).await;
        let receipt = h.staged_order(vec![line("tee", 1)]).await;
        h.saga
            .checkout
            .report_payment_status(&h.status_message(&receipt, "PAYMENT_SUCCESS"))
            .await
            .unwrap();
        h.topic.fail_next_publishes(3).await;

        let err = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(h.published_orders().await.is_empty());

        let report = h
            .saga
            .payment_status
            .process_payment_statuses()
            .await
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(h.published_orders().await.len(), 1);

        let customer = h.repository.require_customer(&h.customer_id).await.unwrap();
        assert_eq!(customer.purchases, 1);
    }
}
