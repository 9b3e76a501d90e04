//! Database operations for orders and the checkout journal.

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    cart::CartEntry,
    catalog::map_snapshot_columns,
    database_id::{CartEntryId, CustomerId, OrderId},
    order::{NewOrder, Order, OrderStatus},
};

const ORDER_COLUMNS: &str = "id, customer_id, quantity, status, placed_at, source_entry_id, \
     item_name, item_description, item_price, item_image, item_categories";

const PENDING_LINE_COLUMNS: &str = "entry_id, customer_id, quantity, item_name, \
     item_description, item_price, item_image, item_categories";

/// Create the order described by `new_order` with the status `processing`.
///
/// If `new_order` comes from a cart entry that already has an order, that
/// order is returned and nothing is inserted.
pub(crate) fn insert_order(
    new_order: &NewOrder,
    placed_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Order, Error> {
    if let Some(entry_id) = new_order.source_entry_id
        && let Some(existing) = get_order_by_source_entry(entry_id, connection)?
    {
        tracing::debug!("cart entry {entry_id} already has order {}", existing.id);
        return Ok(existing);
    }

    let categories = serde_json::to_string(&new_order.item.categories)?;

    connection
        .prepare(&format!(
            "INSERT INTO \"order\" (
                customer_id, quantity, status, placed_at, source_entry_id, item_name,
                item_description, item_price, item_image, item_categories
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING {ORDER_COLUMNS}"
        ))?
        .query_row(
            (
                new_order.customer_id,
                new_order.quantity,
                OrderStatus::Processing,
                placed_at,
                new_order.source_entry_id,
                &new_order.item.name,
                &new_order.item.description,
                new_order.item.price,
                &new_order.item.image,
                categories,
            ),
            map_order_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve a single order by ID.
///
/// # Errors
/// Returns [Error::OrderNotFound] if there is no order with the ID `order_id`.
pub fn get_order(order_id: OrderId, connection: &Connection) -> Result<Order, Error> {
    connection
        .prepare(&format!("SELECT {ORDER_COLUMNS} FROM \"order\" WHERE id = :id"))?
        .query_row(&[(":id", &order_id)], map_order_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::OrderNotFound(order_id),
            error => error.into(),
        })
}

fn get_order_by_source_entry(
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<Option<Order>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM \"order\" WHERE source_entry_id = :entry_id"
        ))?
        .query_row(&[(":entry_id", &entry_id)], map_order_row)
        .optional()
        .map_err(|error| error.into())
}

/// Retrieve the orders of `customer_id`, oldest first.
pub(crate) fn get_orders_for_customer(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<Order>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM \"order\"
             WHERE customer_id = :customer_id
             ORDER BY id ASC"
        ))?
        .query_map(&[(":customer_id", &customer_id)], map_order_row)?
        .map(|maybe_order| maybe_order.map_err(|error| error.into()))
        .collect()
}

/// Retrieve every order, oldest first.
pub(crate) fn get_all_orders(connection: &Connection) -> Result<Vec<Order>, Error> {
    connection
        .prepare(&format!("SELECT {ORDER_COLUMNS} FROM \"order\" ORDER BY id ASC"))?
        .query_map([], map_order_row)?
        .map(|maybe_order| maybe_order.map_err(|error| error.into()))
        .collect()
}

/// Set the status of `order_id` to `status` if, and only if, it is still
/// processing. Returns whether the order was changed.
pub(crate) fn set_status_if_processing(
    order_id: OrderId,
    status: OrderStatus,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "UPDATE \"order\" SET status = ?1 WHERE id = ?2 AND status = ?3",
        (status, order_id, OrderStatus::Processing),
    )?;

    Ok(rows_affected == 1)
}

/// Add a drained cart entry to the checkout journal.
pub(crate) fn insert_pending_line(
    entry: &CartEntry,
    connection: &Connection,
) -> Result<(), Error> {
    let categories = serde_json::to_string(&entry.item.categories)?;

    connection.execute(
        "INSERT INTO pending_checkout (
            entry_id, customer_id, quantity, item_name, item_description, item_price,
            item_image, item_categories
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            entry.id,
            entry.customer_id,
            entry.quantity,
            &entry.item.name,
            &entry.item.description,
            entry.item.price,
            &entry.item.image,
            categories,
        ),
    )?;

    Ok(())
}

/// Retrieve the journal lines of `customer_id` that do not have an order yet,
/// in the order they were drained.
pub fn get_pending_checkout(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartEntry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PENDING_LINE_COLUMNS} FROM pending_checkout
             WHERE customer_id = :customer_id
             ORDER BY line ASC"
        ))?
        .query_map(&[(":customer_id", &customer_id)], |row| {
            Ok(CartEntry {
                id: row.get(0)?,
                customer_id: row.get(1)?,
                quantity: row.get(2)?,
                item: map_snapshot_columns(row, 3)?,
            })
        })?
        .map(|maybe_line| maybe_line.map_err(|error| error.into()))
        .collect()
}

/// Remove the journal line for the cart entry `entry_id` once its order exists.
pub(crate) fn delete_pending_line(
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM pending_checkout WHERE entry_id = ?1",
        [entry_id],
    )?;

    Ok(())
}

/// Initialize the order table and the checkout journal.
pub fn create_order_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"order\" (
            id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 1),
            status TEXT NOT NULL CHECK (status IN ('processing', 'approved', 'rejected')),
            placed_at TEXT NOT NULL,
            source_entry_id INTEGER UNIQUE,
            item_name TEXT NOT NULL,
            item_description TEXT NOT NULL,
            item_price REAL NOT NULL,
            item_image TEXT NOT NULL,
            item_categories TEXT NOT NULL,
            FOREIGN KEY(customer_id) REFERENCES customer(id) ON UPDATE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_order_customer ON \"order\"(customer_id);

        CREATE TABLE IF NOT EXISTS pending_checkout (
            line INTEGER PRIMARY KEY,
            entry_id INTEGER NOT NULL UNIQUE,
            customer_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 1),
            item_name TEXT NOT NULL,
            item_description TEXT NOT NULL,
            item_price REAL NOT NULL,
            item_image TEXT NOT NULL,
            item_categories TEXT NOT NULL,
            FOREIGN KEY(customer_id) REFERENCES customer(id) ON UPDATE CASCADE ON DELETE CASCADE
        );",
    )?;

    Ok(())
}

fn map_order_row(row: &Row) -> Result<Order, rusqlite::Error> {
    Ok(Order {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        quantity: row.get(2)?,
        status: row.get(3)?,
        placed_at: row.get(4)?,
        source_entry_id: row.get(5)?,
        item: map_snapshot_columns(row, 6)?,
    })
}
