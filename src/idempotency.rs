//! Request keys that make retried requests safe.
//!
//! A client may send an `idempotency-key` header with a request that adds to
//! its cart or checks out. The first response for a key is stored, and a
//! retry with the same key gets the stored response instead of repeating
//! the operation. Keys are kept for [REQUEST_KEY_RETENTION], after which the
//! key may be reused.

use std::fmt::Display;

use axum::{extract::FromRequestParts, http::request::Parts};
use rusqlite::{Connection, OptionalExtension};
use serde::{Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};

use crate::{Error, database_id::CustomerId};

/// The header carrying a request key.
pub const REQUEST_KEY_HEADER: &str = "idempotency-key";

/// How long a stored response is replayed for.
pub const REQUEST_KEY_RETENTION: Duration = Duration::days(1);

const MAX_KEY_LENGTH: usize = 255;

/// A client-chosen key that identifies one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Create a request key.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidRequestKey] if `key` is empty or longer than 255 characters.
    pub fn new(key: &str) -> Result<Self, Error> {
        let key = key.trim();

        if key.is_empty() || key.chars().count() > MAX_KEY_LENGTH {
            Err(Error::InvalidRequestKey)
        } else {
            Ok(Self(key.to_owned()))
        }
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extractor for the optional request key header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeRequestKey(pub Option<RequestKey>);

impl<S> FromRequestParts<S> for MaybeRequestKey
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(REQUEST_KEY_HEADER) else {
            return Ok(Self(None));
        };

        let key = value.to_str().map_err(|_| Error::InvalidRequestKey)?;

        RequestKey::new(key).map(|key| Self(Some(key)))
    }
}

/// The operations that accept a request key.
///
/// Keys are scoped to an operation, so the same key may be used once for
/// each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyedOperation {
    AddToCart,
    Checkout,
}

impl KeyedOperation {
    fn as_str(self) -> &'static str {
        match self {
            KeyedOperation::AddToCart => "add_to_cart",
            KeyedOperation::Checkout => "checkout",
        }
    }
}

/// The unix timestamp before which stored responses have expired.
fn retention_cutoff() -> i64 {
    (OffsetDateTime::now_utc() - REQUEST_KEY_RETENTION).unix_timestamp()
}

/// Get the stored response for `key`, or `None` if the key has not been used
/// or its response has expired.
pub(crate) fn find_response<T: DeserializeOwned>(
    customer_id: CustomerId,
    operation: KeyedOperation,
    key: &RequestKey,
    connection: &Connection,
) -> Result<Option<T>, Error> {
    let raw_response: Option<String> = connection
        .query_row(
            "SELECT response FROM request_key
             WHERE customer_id = ?1 AND operation = ?2 AND key = ?3 AND created_at >= ?4",
            (
                customer_id,
                operation.as_str(),
                key.as_ref(),
                retention_cutoff(),
            ),
            |row| row.get(0),
        )
        .optional()?;

    match raw_response {
        Some(raw_response) => {
            tracing::info!(
                "replaying stored response for {} key \"{key}\" of customer {customer_id}",
                operation.as_str()
            );
            Ok(Some(serde_json::from_str(&raw_response)?))
        }
        None => Ok(None),
    }
}

/// Store `response` as the response for `key`, first deleting every expired
/// response.
///
/// Must be called in the same transaction as the operation it records.
pub(crate) fn record_response<T: Serialize>(
    customer_id: CustomerId,
    operation: KeyedOperation,
    key: &RequestKey,
    response: &T,
    connection: &Connection,
) -> Result<(), Error> {
    let raw_response = serde_json::to_string(response)?;

    let expired = connection.execute(
        "DELETE FROM request_key WHERE created_at < ?1",
        [retention_cutoff()],
    )?;
    if expired > 0 {
        tracing::debug!("deleted {expired} expired request keys");
    }

    connection.execute(
        "INSERT INTO request_key (customer_id, operation, key, response, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            customer_id,
            operation.as_str(),
            key.as_ref(),
            raw_response,
            OffsetDateTime::now_utc().unix_timestamp(),
        ),
    )?;

    Ok(())
}

/// Initialize the request key table.
pub fn create_request_key_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS request_key (
            customer_id INTEGER NOT NULL,
            operation TEXT NOT NULL,
            key TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY(customer_id, operation, key),
            FOREIGN KEY(customer_id) REFERENCES customer(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}
