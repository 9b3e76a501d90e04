//! Canteen is the backend of an online ordering service.
//!
//! Customers browse a catalog of items grouped into categories, collect items
//! in a cart and turn the cart into orders that staff approve or reject.
//!
//! Each customer's cart is stored twice, embedded in the customer's record and
//! as standalone records, and [cart::sync] keeps the two in agreement. Orders
//! move from `processing` to exactly one of `approved` or `rejected`. Deleting
//! or renaming a category updates every item that references it.
//!
//! This library provides a JSON REST API, see [build_router].

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
pub mod cart;
pub mod catalog;
pub mod customer;
pub mod database_id;
mod db;
pub mod endpoints;
mod error;
pub mod idempotency;
pub mod identity;
mod logging;
pub mod order;
mod routing;

pub use app_state::AppState;
pub use db::{DEFAULT_STORE_TIMEOUT, Database, initialize as initialize_db};
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
