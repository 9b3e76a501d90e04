//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// Identifies a customer record.
pub type CustomerId = DatabaseId;
/// Identifies a catalog item.
pub type ItemId = DatabaseId;
/// Identifies a category definition.
pub type CategoryId = DatabaseId;
/// Identifies a cart entry in both the embedded mirror and the standalone records.
pub type CartEntryId = DatabaseId;
/// Identifies an order.
pub type OrderId = DatabaseId;
