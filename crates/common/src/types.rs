use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a store customer.
    CustomerId
);

string_id!(
    /// Identifier of an order, `<customer id>-<order number>`.
    OrderId
);

string_id!(
    /// Identifier of a payment transaction.
    TransactionId
);

string_id!(
    /// Catalog identifier of a store item (independent of size).
    ItemId
);

impl OrderId {
    /// Builds the order id for a customer's `sequence`-th order.
    pub fn for_customer(customer_id: &CustomerId, sequence: u32) -> Self {
        Self(format!("{customer_id}-{sequence}"))
    }
}
