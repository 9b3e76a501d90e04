//! Database operations for the standalone cart records.
//!
//! These functions touch only the `cart_entry` table. Keeping it in step
//! with the embedded cart is the job of [crate::cart::sync].

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error,
    cart::{CartEntry, Quantity},
    catalog::map_snapshot_columns,
    database_id::{CartEntryId, CustomerId},
};

const CART_ENTRY_COLUMNS: &str = "id, customer_id, quantity, item_name, item_description, \
     item_price, item_image, item_categories";

/// Insert the standalone record for `entry`.
pub(crate) fn insert_cart_record(
    entry: &CartEntry,
    connection: &Connection,
) -> Result<(), Error> {
    let categories = serde_json::to_string(&entry.item.categories)?;

    connection.execute(
        "INSERT INTO cart_entry (
            id, customer_id, quantity, item_name, item_description, item_price, item_image,
            item_categories
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

/// Retrieve the standalone record with the ID `entry_id` in the cart of
/// `customer_id`, or `None` if there is no such record.
pub(crate) fn get_cart_record(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<Option<CartEntry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CART_ENTRY_COLUMNS} FROM cart_entry
             WHERE id = :id AND customer_id = :customer_id"
        ))?
        .query_row(
            &[(":id", &entry_id), (":customer_id", &customer_id)],
            map_cart_entry_row,
        )
        .optional()
        .map_err(|error| error.into())
}

/// Retrieve the first standalone record for the item `item_name` in the cart
/// of `customer_id`, or `None` if there is no such record.
pub(crate) fn get_cart_record_by_item_name(
    customer_id: CustomerId,
    item_name: &str,
    connection: &Connection,
) -> Result<Option<CartEntry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CART_ENTRY_COLUMNS} FROM cart_entry
             WHERE customer_id = :customer_id AND item_name = :item_name
             ORDER BY id ASC
             LIMIT 1"
        ))?
        .query_row(
            rusqlite::named_params! {
                ":customer_id": customer_id,
                ":item_name": item_name,
            },
            map_cart_entry_row,
        )
        .optional()
        .map_err(|error| error.into())
}

/// Retrieve every standalone record in the cart of `customer_id`, oldest first.
pub(crate) fn get_cart_records(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartEntry>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CART_ENTRY_COLUMNS} FROM cart_entry
             WHERE customer_id = :customer_id
             ORDER BY id ASC"
        ))?
        .query_map(&[(":customer_id", &customer_id)], map_cart_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the quantity of the standalone record `entry_id`.
pub(crate) fn set_cart_record_quantity(
    entry_id: CartEntryId,
    quantity: Quantity,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE cart_entry SET quantity = ?1 WHERE id = ?2",
        (quantity, entry_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::EntryNotFound(entry_id));
    }

    Ok(())
}

/// Delete the standalone record `entry_id`.
pub(crate) fn delete_cart_record(
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM cart_entry WHERE id = ?1", [entry_id])?;

    if rows_affected == 0 {
        return Err(Error::EntryNotFound(entry_id));
    }

    Ok(())
}

/// Delete every standalone record in the cart of `customer_id`, returning how
/// many were deleted.
pub(crate) fn delete_cart_records(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM cart_entry WHERE customer_id = ?1",
        [customer_id],
    )?;

    Ok(rows_affected)
}

/// Initialize the standalone cart record table.
///
/// Entry IDs are allocated from the `cart_entry` sequence rather than by the
/// table, so the embedded copy of an entry can be written before its record.
pub fn create_cart_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS cart_entry (
            id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 1),
            item_name TEXT NOT NULL,
            item_description TEXT NOT NULL,
            item_price REAL NOT NULL,
            item_image TEXT NOT NULL,
            item_categories TEXT NOT NULL,
            FOREIGN KEY(customer_id) REFERENCES customer(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_cart_entry_customer ON cart_entry(customer_id);",
    )?;

    Ok(())
}

fn map_cart_entry_row(row: &Row) -> Result<CartEntry, rusqlite::Error> {
    Ok(CartEntry {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        quantity: row.get(2)?,
        item: map_snapshot_columns(row, 3)?,
    })
}
