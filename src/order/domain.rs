//! Core order domain types.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    cart::Quantity,
    catalog::ItemSnapshot,
    database_id::{CartEntryId, CustomerId, OrderId},
};

/// Where an order is in its lifecycle.
///
/// Orders start out as [OrderStatus::Processing] and move exactly once to
/// either [OrderStatus::Approved] or [OrderStatus::Rejected].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Waiting for staff to approve or reject it.
    Processing,
    /// Accepted by staff. Final.
    Approved,
    /// Declined by staff. Final.
    Rejected,
}

impl OrderStatus {
    /// The status as it is stored and serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Approved => "approved",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Whether the order can no longer change status.
    pub fn is_final(self) -> bool {
        self != OrderStatus::Processing
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "processing" => Ok(OrderStatus::Processing),
            "approved" => Ok(OrderStatus::Approved),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(FromSqlError::Other(
                format!("unknown order status \"{other}\"").into(),
            )),
        }
    }
}

/// A purchase of one item, in some quantity, by one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// The ID of the order.
    pub id: OrderId,
    /// The customer who placed the order.
    pub customer_id: CustomerId,
    /// The item as it was when the order was placed.
    pub item: ItemSnapshot,
    /// How many units were ordered.
    pub quantity: Quantity,
    /// Where the order is in its lifecycle.
    pub status: OrderStatus,
    /// When the order was placed, in UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub placed_at: OffsetDateTime,
    /// The cart entry the order was placed from, `None` for orders placed
    /// directly.
    pub source_entry_id: Option<CartEntryId>,
}

/// The details needed to place an order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    /// The customer placing the order.
    pub customer_id: CustomerId,
    /// The item being ordered.
    pub item: ItemSnapshot,
    /// How many units are being ordered.
    pub quantity: Quantity,
    /// The cart entry the order comes from, if any.
    ///
    /// At most one order is ever created for a cart entry.
    pub source_entry_id: Option<CartEntryId>,
}

/// Whether an order was placed for one drained cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    /// The cart entry the order was for.
    pub entry_id: CartEntryId,
    /// The name of the item in the entry.
    pub item_name: String,
    /// What happened.
    #[serde(flatten)]
    pub result: CheckoutResult,
}

impl CheckoutOutcome {
    /// Whether the order for this entry was placed.
    pub fn is_placed(&self) -> bool {
        matches!(self.result, CheckoutResult::Placed { .. })
    }
}

/// What happened to one line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutResult {
    /// The order was created.
    Placed {
        /// The ID of the new order.
        order_id: OrderId,
    },
    /// The order could not be created, the line stays in the checkout
    /// journal until the checkout is resumed.
    Failed {
        /// Why the order could not be created.
        reason: String,
    },
}
