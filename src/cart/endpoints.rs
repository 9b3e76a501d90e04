//! JSON endpoints for a customer's own cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use crate::{
    Error,
    cart::{
        AddedToCart, CartEntry, CartRepair, add_or_merge, audit_cart, decrement, get_cart,
        get_cart_entry, increment, remove, repair_cart,
    },
    catalog::get_item_by_name,
    database_id::CartEntryId,
    db::Database,
    identity::CurrentCustomer,
    idempotency::MaybeRequestKey,
};

/// The request body for adding an item to the cart.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    /// The name of the catalog item to add.
    pub item: String,
    /// How many units to add.
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// List the entries in the current customer's cart.
pub async fn get_cart_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Vec<CartEntry>>, Error> {
    database
        .run(move |connection| get_cart(customer_id, connection))
        .await
        .map(Json)
}

/// Add an item from the catalog to the current customer's cart.
///
/// The item is snapshotted as it is right now.
pub async fn add_to_cart_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
    MaybeRequestKey(request_key): MaybeRequestKey,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<AddedToCart>, Error> {
    database
        .run(move |connection| {
            let item = get_item_by_name(&request.item, connection)?;

            add_or_merge(
                customer_id,
                item.snapshot(),
                request.quantity,
                request_key.as_ref(),
                connection,
            )
        })
        .await
        .map(Json)
}

/// Look up one entry of the current customer's cart.
pub async fn get_cart_entry_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(entry_id): Path<CartEntryId>,
) -> Result<Json<CartEntry>, Error> {
    database
        .run(move |connection| get_cart_entry(customer_id, entry_id, connection))
        .await
        .map(Json)
}

/// Add one to the quantity of a cart entry.
pub async fn increment_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(entry_id): Path<CartEntryId>,
) -> Result<Json<CartEntry>, Error> {
    database
        .run(move |connection| increment(customer_id, entry_id, connection))
        .await
        .map(Json)
}

/// Subtract one from the quantity of a cart entry.
pub async fn decrement_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(entry_id): Path<CartEntryId>,
) -> Result<Json<CartEntry>, Error> {
    database
        .run(move |connection| decrement(customer_id, entry_id, connection))
        .await
        .map(Json)
}

/// Take an entry out of the cart, returning the removed entry.
pub async fn remove_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(entry_id): Path<CartEntryId>,
) -> Result<Json<CartEntry>, Error> {
    database
        .run(move |connection| remove(customer_id, entry_id, connection))
        .await
        .map(Json)
}

/// List the disagreements between the two copies of the cart.
pub async fn audit_cart_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Vec<CartRepair>>, Error> {
    database
        .run(move |connection| audit_cart(customer_id, connection))
        .await
        .map(Json)
}

/// Repair every disagreement between the two copies of the cart.
pub async fn repair_cart_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Vec<CartRepair>>, Error> {
    database
        .run(move |connection| repair_cart(customer_id, connection))
        .await
        .map(Json)
}
