//! Core catalog domain types.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{CategoryId, ItemId},
};

/// The name of the category every item belongs to.
///
/// It is created with the database, can never be renamed or deleted, and is
/// never removed from an item's memberships.
pub const ALL_CATEGORY: &str = "All";

/// A validated, non-empty category name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// Leading and trailing whitespace is removed.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is
    /// empty or just whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Whether this is the sentinel "All" category.
    pub fn is_all(&self) -> bool {
        self.0 == ALL_CATEGORY
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category that items can be grouped under (e.g., 'Drinks', 'Snacks').
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The unique name of the category.
    pub name: CategoryName,
}

/// The price of an item, a finite, non-negative amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Price(f64);

impl Price {
    /// Create a price.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidPrice] if `amount` is negative, NaN or infinite.
    pub fn new(amount: f64) -> Result<Self, Error> {
        if amount.is_finite() && amount >= 0.0 {
            Ok(Self(amount))
        } else {
            Err(Error::InvalidPrice(amount))
        }
    }

    /// The amount as a float.
    pub fn amount(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Price {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for f64 {
    fn from(value: Price) -> Self {
        value.0
    }
}

impl ToSql for Price {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for Price {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let amount = f64::column_result(value)?;
        Price::new(amount).map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// The set of category names an item belongs to.
///
/// Items reference categories by name. The set always contains
/// [ALL_CATEGORY], which cannot be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct Memberships(BTreeSet<String>);

impl Memberships {
    /// Memberships containing only the "All" category.
    pub fn new() -> Self {
        Self(BTreeSet::from([ALL_CATEGORY.to_owned()]))
    }

    /// Whether the item belongs to the category `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Add the category `name`, returning `false` if it was already present.
    pub fn insert(&mut self, name: &CategoryName) -> bool {
        self.0.insert(name.as_ref().to_owned())
    }

    /// Remove the category `name`, returning `false` if it was absent.
    ///
    /// "All" is never removed.
    pub fn remove(&mut self, name: &str) -> bool {
        name != ALL_CATEGORY && self.0.remove(name)
    }

    /// Replace `old` with `new`, returning `false` if the item did not
    /// belong to `old`.
    pub fn rename(&mut self, old: &str, new: &CategoryName) -> bool {
        if !self.remove(old) {
            return false;
        }

        self.insert(new);
        true
    }

    /// Iterate over the category names in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for Memberships {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BTreeSet<String>> for Memberships {
    fn from(mut names: BTreeSet<String>) -> Self {
        names.insert(ALL_CATEGORY.to_owned());
        Self(names)
    }
}

impl From<Memberships> for BTreeSet<String> {
    fn from(value: Memberships) -> Self {
        value.0
    }
}

impl ToSql for Memberships {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let json = serde_json::to_string(&self.0)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;

        Ok(ToSqlOutput::from(json))
    }
}

impl FromSql for Memberships {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let names: BTreeSet<String> = serde_json::from_str(value.as_str()?)
            .map_err(|error| FromSqlError::Other(Box::new(error)))?;

        Ok(names.into())
    }
}

/// An item in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The ID of the item.
    pub id: ItemId,
    /// The unique name of the item.
    pub name: String,
    /// A short description shown alongside the item.
    pub description: String,
    /// How much one unit of the item costs.
    pub price: Price,
    /// A URL or path to a picture of the item.
    pub image: String,
    /// The names of the categories the item belongs to.
    pub categories: Memberships,
}

impl Item {
    /// Copy the item's display fields as they are right now.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            image: self.image.clone(),
            categories: self.categories.iter().map(str::to_owned).collect(),
        }
    }
}

/// A value copy of an item taken when it was added to a cart or ordered.
///
/// Later edits to the catalog do not change a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// The item's name, which identifies the item within a cart.
    pub name: String,
    /// The item's description.
    pub description: String,
    /// The unit price at the time of the snapshot.
    pub price: Price,
    /// The item's image.
    pub image: String,
    /// The categories the item belonged to.
    pub categories: BTreeSet<String>,
}

/// The fields needed to create or edit an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetails {
    /// The item's name, must not be empty.
    pub name: String,
    /// The item's description.
    pub description: String,
    /// The item's price.
    pub price: Price,
    /// The item's image.
    pub image: String,
    /// A category to add the item to, in addition to "All".
    pub category: Option<CategoryName>,
}

/// The result of one part of a batch operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// The name of the item or category the outcome is for.
    pub name: String,
    /// Why this part failed, `None` if it succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    pub(crate) fn succeeded(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            error: None,
        }
    }

    pub(crate) fn failed(name: &str, error: &Error) -> Self {
        Self {
            name: name.to_owned(),
            error: Some(error.to_string()),
        }
    }

    /// Whether this part of the batch succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The per-name results of a batch operation, in the order the names were given.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchReport(pub Vec<BatchOutcome>);

impl BatchReport {
    /// Whether every part of the batch succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.0.iter().all(BatchOutcome::is_success)
    }

    /// The parts of the batch that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.0.iter().filter(|outcome| !outcome.is_success())
    }
}

/// A category after it was created or renamed, plus the results of adding
/// the selected items to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChange {
    /// The category as it is now stored.
    pub category: Category,
    /// The result for each selected item.
    pub assignments: BatchReport,
}

/// An item that references a category name that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleMembership {
    /// The name of the item.
    pub item: String,
    /// The category name that no longer exists.
    pub category: String,
}
