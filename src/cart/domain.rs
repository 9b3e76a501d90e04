//! Core cart domain types.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    catalog::ItemSnapshot,
    database_id::{CartEntryId, CustomerId},
};

/// How many units of an item are in a cart entry or an order, always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    /// A quantity of one, the smallest allowed.
    pub const ONE: Quantity = Quantity(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidQuantity] if `count` is less than one.
    pub fn new(count: i64) -> Result<Self, Error> {
        if count >= 1 {
            Ok(Self(count))
        } else {
            Err(Error::InvalidQuantity(count))
        }
    }

    /// Create a quantity without validation.
    ///
    /// The caller should ensure that `count` is at least one.
    pub fn new_unchecked(count: i64) -> Self {
        Self(count)
    }

    /// The quantity as an integer.
    pub fn get(self) -> i64 {
        self.0
    }

    /// Add two quantities.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidQuantity] holding the saturated sum if the sum
    /// does not fit in an `i64`.
    pub fn plus(self, other: Quantity) -> Result<Self, Error> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(Error::InvalidQuantity(self.0.saturating_add(other.0)))
    }

    /// One less than this quantity, or `None` if this is already one.
    pub fn decrement(self) -> Option<Self> {
        (self.0 > 1).then(|| Self(self.0 - 1))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quantity::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Quantity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for Quantity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let count = i64::column_result(value)?;
        Quantity::new(count).map_err(|_| FromSqlError::OutOfRange(count))
    }
}

/// One line of a customer's cart.
///
/// The same entry is stored twice: inside the customer's record (the
/// embedded cart) and as a standalone record that can be looked up by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    /// The ID shared by both copies of the entry.
    pub id: CartEntryId,
    /// The customer whose cart the entry is in.
    pub customer_id: CustomerId,
    /// The item as it was when it was first added to the cart.
    pub item: ItemSnapshot,
    /// How many units of the item are in the cart.
    pub quantity: Quantity,
}

/// What was done to bring the two copies of a cart entry back into agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Resolution {
    /// Both copies now exist with this quantity.
    Restored {
        /// The higher of the two quantities that were found.
        quantity: Quantity,
    },
    /// Both copies are now gone.
    Removed,
}

/// A disagreement between the embedded cart and the standalone records for
/// one entry, and how it was (or would be) resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRepair {
    /// The entry that disagreed.
    pub entry_id: CartEntryId,
    /// The name of the item in the entry.
    pub item_name: String,
    /// The quantity in the embedded cart, `None` if the entry was missing there.
    pub embedded: Option<Quantity>,
    /// The quantity in the standalone record, `None` if there was no record.
    pub standalone: Option<Quantity>,
    /// How the disagreement was resolved.
    pub resolution: Resolution,
}

/// The result of adding an item to a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedToCart {
    /// The cart entry for the item after the quantity was added.
    pub entry: CartEntry,
    /// The repair made to the entry before the quantity was added, if its two
    /// copies disagreed.
    pub repair: Option<CartRepair>,
}
