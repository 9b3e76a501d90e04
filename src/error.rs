//! Defines the app level error type and its conversion to JSON responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    cart::CartRepair,
    database_id::{CartEntryId, OrderId},
    order::{CheckoutOutcome, OrderStatus},
};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A quantity that is not a positive integer was given for a cart entry or
    /// an order.
    #[error("{0} is not a valid quantity, quantities must be positive integers")]
    InvalidQuantity(i64),

    /// A price that is negative or not a finite number was given for an item.
    #[error("{0} is not a valid price")]
    InvalidPrice(f64),

    /// An empty string was used to create an item name.
    #[error("item name cannot be empty")]
    EmptyItemName,

    /// An empty string was used to create a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used as a customer's username.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// The idempotency key sent with a request was empty or too long.
    #[error("idempotency keys must be between 1 and 255 characters")]
    InvalidRequestKey,

    /// The cart entry could not be found in either the customer's embedded
    /// cart or the standalone cart records.
    #[error("cart entry {0} could not be found")]
    EntryNotFound(CartEntryId),

    /// The embedded cart and the standalone cart records disagreed about an
    /// entry.
    ///
    /// By the time this error is returned the two representations have been
    /// brought back into agreement, the payload describes what was repaired.
    /// The requested change was not applied and may be retried.
    #[error("cart entry {} was inconsistent and has been repaired", .0.entry_id)]
    EntryInconsistent(CartRepair),

    /// The cart could not be emptied for checkout, nothing was removed.
    ///
    /// The payload lists the inconsistent entries that were repaired, a retry
    /// of the checkout will see a consistent cart.
    #[error("the cart could not be drained, {} entries were inconsistent", .0.len())]
    DrainFailed(Vec<CartRepair>),

    /// The cart was drained but orders could only be created for some of its
    /// entries.
    ///
    /// The payload names every drained entry and whether its order was
    /// placed. Entries that failed remain in the checkout journal until the
    /// checkout is resumed.
    #[error(
        "{} of {} orders could not be placed",
        .0.iter().filter(|outcome| !outcome.is_placed()).count(),
        .0.len()
    )]
    PartialOrderFailure(Vec<CheckoutOutcome>),

    /// The order does not exist.
    #[error("order {0} could not be found")]
    OrderNotFound(OrderId),

    /// The order cannot move to the requested status from its current one.
    #[error("order {order_id} cannot go from {from} to {to}")]
    InvalidTransition {
        /// The order that was asked to change.
        order_id: OrderId,
        /// The status of the order when the change was attempted.
        from: OrderStatus,
        /// The status that was requested.
        to: OrderStatus,
    },

    /// A category with this name already exists.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategory(String),

    /// An item with this name already exists in the catalog.
    #[error("the item \"{0}\" already exists")]
    DuplicateItemName(String),

    /// A customer with this username already exists.
    #[error("the username \"{0}\" is already taken")]
    DuplicateUsername(String),

    /// No catalog item has this name.
    #[error("no item is named \"{0}\"")]
    ItemNotFound(String),

    /// No category has this name.
    #[error("no category is named \"{0}\"")]
    CategoryNotFound(String),

    /// The sentinel category "All" cannot be renamed or deleted.
    #[error("the \"All\" category cannot be renamed or deleted")]
    ProtectedCategory,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The store did not respond within the configured timeout.
    ///
    /// This error is transient and the caller may retry.
    #[error("the store is temporarily unavailable, try again later")]
    StoreUnavailable,

    /// The request did not carry a usable identity.
    #[error("the request does not identify who is making it")]
    Unauthenticated,

    /// The identity making the request is not allowed to perform it.
    #[error("you are not allowed to do that")]
    Forbidden,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// A stored JSON document could not be serialized or deserialized.
    #[error("could not (de)serialize JSON: {0}")]
    JSONSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if matches!(
                    sql_error.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                tracing::warn!("the database stayed busy past the store timeout");
                Error::StoreUnavailable
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        tracing::error!("could not (de)serialize JSON: {value}");
        Error::JSONSerializationError(value.to_string())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidQuantity(_)
            | Error::InvalidPrice(_)
            | Error::EmptyItemName
            | Error::EmptyCategoryName
            | Error::EmptyUsername
            | Error::InvalidRequestKey
            | Error::ItemNotFound(_)
            | Error::CategoryNotFound(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden | Error::ProtectedCategory => StatusCode::FORBIDDEN,
            Error::EntryNotFound(_) | Error::OrderNotFound(_) | Error::NotFound => {
                StatusCode::NOT_FOUND
            }
            Error::EntryInconsistent(_)
            | Error::DrainFailed(_)
            | Error::InvalidTransition { .. }
            | Error::DuplicateCategory(_)
            | Error::DuplicateItemName(_)
            | Error::DuplicateUsername(_) => StatusCode::CONFLICT,
            Error::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::PartialOrderFailure(_)
            | Error::SqlError(_)
            | Error::JSONSerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let body = match self {
            Error::EntryInconsistent(ref repair) => {
                json!({ "error": self.to_string(), "repair": repair })
            }
            Error::DrainFailed(ref repairs) => {
                json!({ "error": self.to_string(), "repairs": repairs })
            }
            Error::PartialOrderFailure(ref outcomes) => {
                tracing::error!("{self}: {outcomes:?}");
                json!({ "error": self.to_string(), "outcomes": outcomes })
            }
            // Storage internals are not intended to be shown to the client.
            Error::SqlError(_) | Error::JSONSerializationError(_) => {
                tracing::error!("An unexpected error occurred: {}", self);
                json!({ "error": "An unexpected error occurred, check the server logs for more details." })
            }
            error => json!({ "error": error.to_string() }),
        };

        (status_code, Json(body)).into_response()
    }
}
