/// Names of the tables each component reads and writes.
///
/// Passed explicitly at construction; there is no global registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub customers: String,
    pub orders: String,
    pub transactions: String,
    pub store_items: String,
    pub parcels: String,
    pub shipments: String,
    pub inventory_adjustments: String,
}

impl TableNames {
    /// Default names with a common prefix, e.g. `"staging_"`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            customers: format!("{prefix}customers"),
            orders: format!("{prefix}orders"),
            transactions: format!("{prefix}transactions"),
            store_items: format!("{prefix}store_items"),
            parcels: format!("{prefix}parcels"),
            shipments: format!("{prefix}shipments"),
            inventory_adjustments: format!("{prefix}inventory_adjustments"),
        }
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self::with_prefix("")
    }
}
