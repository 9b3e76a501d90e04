//! JSON endpoints for placing orders and for staff to review them.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    Error,
    catalog::get_item_by_name,
    database_id::OrderId,
    db::Database,
    identity::{CurrentCustomer, StaffMember},
    idempotency::MaybeRequestKey,
    order::{
        Order, OrderStatus, SharedOrderStore, list_all, list_for_customer, place_from_cart,
        place_single, resume_checkout, transition,
    },
};

/// The request body for ordering a single item directly.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// The name of the catalog item to order.
    pub item: String,
    /// How many units to order.
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Order one item for the current customer without going through the cart.
pub async fn place_order_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), Error> {
    let order = database
        .run(move |connection| {
            let item = get_item_by_name(&request.item, connection)?;

            place_single(customer_id, item.snapshot(), request.quantity, connection)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// Turn the current customer's cart into orders.
pub async fn checkout_endpoint(
    State(database): State<Database>,
    State(order_store): State<SharedOrderStore>,
    CurrentCustomer(customer_id): CurrentCustomer,
    MaybeRequestKey(request_key): MaybeRequestKey,
) -> Result<Json<Vec<Order>>, Error> {
    database
        .run(move |connection| {
            place_from_cart(
                customer_id,
                request_key.as_ref(),
                &*order_store,
                connection,
            )
        })
        .await
        .map(Json)
}

/// Place the orders left over from the current customer's interrupted
/// checkout.
pub async fn resume_checkout_endpoint(
    State(database): State<Database>,
    State(order_store): State<SharedOrderStore>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Vec<Order>>, Error> {
    database
        .run(move |connection| resume_checkout(customer_id, &*order_store, connection))
        .await
        .map(Json)
}

/// List the current customer's orders.
pub async fn get_my_orders_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Vec<Order>>, Error> {
    database
        .run(move |connection| list_for_customer(customer_id, connection))
        .await
        .map(Json)
}

/// List every order.
pub async fn get_all_orders_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
) -> Result<Json<Vec<Order>>, Error> {
    database.run(list_all).await.map(Json)
}

/// Approve a processing order.
pub async fn approve_order_endpoint(
    State(database): State<Database>,
    StaffMember(role): StaffMember,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, Error> {
    tracing::debug!("{role:?} is approving order {order_id}");
    database
        .run(move |connection| transition(order_id, OrderStatus::Approved, connection))
        .await
        .map(Json)
}

/// Reject a processing order.
pub async fn reject_order_endpoint(
    State(database): State<Database>,
    StaffMember(role): StaffMember,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, Error> {
    tracing::debug!("{role:?} is rejecting order {order_id}");
    database
        .run(move |connection| transition(order_id, OrderStatus::Rejected, connection))
        .await
        .map(Json)
}
