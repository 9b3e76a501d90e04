//! Placing single orders and moving orders through their lifecycle.
//!
//! Orders start as `processing` and staff move each one exactly once to
//! `approved` or `rejected`. The move is a single conditional update, so when
//! two staff members act on the same order at once only one of them wins.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    cart::Quantity,
    catalog::ItemSnapshot,
    customer::customer_exists,
    database_id::{CustomerId, OrderId},
    db::begin_immediate,
    order::{
        NewOrder, Order, OrderStatus,
        db::{
            get_all_orders, get_order, get_orders_for_customer, insert_order,
            set_status_if_processing,
        },
    },
};

/// Place an order for `quantity` units of `item` without touching the cart.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidQuantity] if `quantity` is less than one,
/// - [Error::NotFound] if the customer does not exist,
/// - [Error::StoreUnavailable] if the store timed out,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn place_single(
    customer_id: CustomerId,
    item: ItemSnapshot,
    quantity: i64,
    connection: &Connection,
) -> Result<Order, Error> {
    let quantity = Quantity::new(quantity)?;
    let transaction = begin_immediate(connection)?;

    if !customer_exists(customer_id, &transaction)? {
        return Err(Error::NotFound);
    }

    let new_order = NewOrder {
        customer_id,
        item,
        quantity,
        source_entry_id: None,
    };
    let order = insert_order(&new_order, OffsetDateTime::now_utc(), &transaction)?;
    transaction.commit()?;

    tracing::info!(
        "customer {customer_id} placed order {} for {} x {}",
        order.id,
        order.quantity,
        order.item.name
    );

    Ok(order)
}

/// Move the order `order_id` from `processing` to `target`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::OrderNotFound] if the order does not exist,
/// - [Error::InvalidTransition] if the order is no longer processing (another
///   transition got there first) or `target` is `processing`,
/// - [Error::StoreUnavailable] if the store timed out,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn transition(
    order_id: OrderId,
    target: OrderStatus,
    connection: &Connection,
) -> Result<Order, Error> {
    let transaction = begin_immediate(connection)?;

    let changed =
        target.is_final() && set_status_if_processing(order_id, target, &transaction)?;
    let order = get_order(order_id, &transaction)?;

    if !changed {
        return Err(Error::InvalidTransition {
            order_id,
            from: order.status,
            to: target,
        });
    }

    transaction.commit()?;
    tracing::info!("order {order_id} is now {target}");

    Ok(order)
}

/// List the orders placed by `customer_id`, oldest first.
pub fn list_for_customer(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<Order>, Error> {
    get_orders_for_customer(customer_id, connection)
}

/// List every order, oldest first.
pub fn list_all(connection: &Connection) -> Result<Vec<Order>, Error> {
    get_all_orders(connection)
}
