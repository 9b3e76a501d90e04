//! Extractors that identify who is making a request.
//!
//! Customers identify themselves with the `x-customer-id` header and staff
//! with the `x-staff-role` header. Session handling lives in front of this
//! service, these extractors only check that the identity is usable.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};

use crate::{Error, customer::customer_exists, database_id::CustomerId, db::Database};

/// The header carrying the ID of the customer making the request.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

/// The header carrying the role of the staff member making the request.
pub const STAFF_ROLE_HEADER: &str = "x-staff-role";

/// Extractor that requires a registered customer.
///
/// Rejects the request with [Error::Unauthenticated] if the header is
/// missing, malformed or names a customer that does not exist.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentCustomer(customer_id): CurrentCustomer) -> impl IntoResponse {
///     format!("Hello, customer {customer_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for CurrentCustomer
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let customer_id: CustomerId = parts
            .headers
            .get(CUSTOMER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .ok_or(Error::Unauthenticated)?;

        let exists = Database::from_ref(state)
            .run(move |connection| customer_exists(customer_id, connection))
            .await?;

        if !exists {
            tracing::debug!("rejecting request from unknown customer {customer_id}");
            return Err(Error::Unauthenticated);
        }

        Ok(Self(customer_id))
    }
}

/// The roles staff members can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    /// Runs the shop floor, can manage the catalog and orders.
    Manager,
    /// Has every permission a manager has.
    SuperAdmin,
}

impl StaffRole {
    fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manager" => Some(Self::Manager),
            "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// Extractor that requires a staff member.
///
/// Rejects the request with [Error::Unauthenticated] if the header is
/// missing, or [Error::Forbidden] if it names a role that is not a staff role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffMember(pub StaffRole);

impl<S> FromRequestParts<S> for StaffMember
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(STAFF_ROLE_HEADER)
            .ok_or(Error::Unauthenticated)?
            .to_str()
            .map_err(|_| Error::Forbidden)?;

        StaffRole::from_header(value)
            .map(Self)
            .ok_or(Error::Forbidden)
    }
}
