pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod queues;
pub mod shipping;
