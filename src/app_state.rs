//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    db::Database,
    order::{SQLiteOrderStore, SharedOrderStore},
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The shared database connection.
    pub database: Database,

    /// Where checkouts place their orders.
    pub order_store: SharedOrderStore,
}

impl AppState {
    /// Create a new [AppState] that places orders in `database`.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            order_store: Arc::new(SQLiteOrderStore),
        }
    }

    /// Replace the store used to place orders during checkout.
    pub fn with_order_store(mut self, order_store: SharedOrderStore) -> Self {
        self.order_store = order_store;
        self
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.database.clone()
    }
}

impl FromRef<AppState> for SharedOrderStore {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.order_store)
    }
}
