//! Wiring of the saga components over shared transports.

use domain::Repository;
use queue::{QueueClient, QueueTransport, TopicClient, TopicTransport};
use record_store::RecordStore;

use crate::checkout::CheckoutCoordinator;
use crate::compensation::{CompensationEmitter, InventoryAdjustmentApplier};
use crate::config::SagaConfig;
use crate::inventory::InventoryReservationService;
use crate::payment_status::PaymentStatusProcessor;
use crate::staging::OrderStagingCoordinator;

/// Every saga component, built from one store, one queue transport and one
/// topic transport.
pub struct SagaComponents<S, T, P> {
    pub checkout: CheckoutCoordinator<S, T>,
    pub staging: OrderStagingCoordinator<S, T>,
    pub payment_status: PaymentStatusProcessor<S, T, P>,
    pub adjustments: InventoryAdjustmentApplier<S, T>,
}

impl<S, T, P> SagaComponents<S, T, P>
where
    S: RecordStore + Clone + 'static,
    T: QueueTransport + Clone,
    P: TopicTransport,
{
    pub fn build(repository: Repository<S>, queues: T, topic: P, config: &SagaConfig) -> Self {
        let names = &config.queues;
        let client = QueueClient::new(queues, config.retry);
        let compensation = CompensationEmitter::new(
            client.with_policy(config.compensation_policy()),
            names.inventory_update.clone(),
        );

        let staging = OrderStagingCoordinator::new(
            repository.clone(),
            client.clone(),
            names.staging.clone(),
            config.staging,
        );
        let reservation = InventoryReservationService::new(repository.clone(), compensation.clone());
        let checkout = CheckoutCoordinator::new(
            repository.clone(),
            reservation,
            staging.clone(),
            client.clone(),
            names.payment_status.clone(),
            config.order_ttl_ms,
            config.sales_tax_rate,
        );
        let payment_status = PaymentStatusProcessor::new(
            repository.clone(),
            client.clone(),
            TopicClient::new(topic, config.fulfillment_policy()),
            compensation,
            names.payment_status.clone(),
            names.fulfillment_topic.clone(),
            config.payment_status,
        );
        let adjustments = InventoryAdjustmentApplier::new(
            repository,
            client,
            names.inventory_update.clone(),
            config.inventory_update,
        );

        Self {
            checkout,
            staging,
            payment_status,
            adjustments,
        }
    }
}
