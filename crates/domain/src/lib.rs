//! Domain layer for the order-processing saga.
//!
//! This crate provides:
//! - Orders, customers, transactions and store items as serde documents
//! - Payment status codes and their mapping onto order statuses
//! - Shipping reference data (parcel templates, packages, shipments)
//! - [`Repository`], typed access to every table over a record store

pub mod customer;
pub mod error;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod repository;
pub mod shipping;
pub mod staging;
pub mod tables;

pub use customer::Customer;
pub use error::{DomainError, Result};
pub use inventory::{InventoryAdjustment, StoreItem};
pub use order::{
    Address, CartLineItem, DEFAULT_ORDER_TTL_MS, DistanceUnit, MassUnit, Money, Order,
    OrderStatus, OrderTotals, Receipt, ShippingDimensions, round_up_to_cent,
};
pub use payment::{PaymentStatus, PaymentStatusMessage, Transaction};
pub use repository::Repository;
pub use shipping::{
    Package, PackedItem, ParcelDimensions, ParcelTemplate, RateSummary, ServiceLevel, Shipment,
};
pub use staging::StagedOrder;
pub use tables::TableNames;
