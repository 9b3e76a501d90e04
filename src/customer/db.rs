//! Code for creating the customer table, fetching customers and reading and
//! writing the cart embedded in each customer's record.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, cart::CartEntry, database_id::CustomerId, db::is_unique_violation};

const CUSTOMER_COLUMNS: &str = "id, username, first_name, last_name, cart";

/// A customer of the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// The customer's ID in the application database.
    pub id: CustomerId,
    /// The unique name the customer signs in with.
    pub username: String,
    /// The customer's first name.
    pub first_name: String,
    /// The customer's last name.
    pub last_name: String,
    /// The embedded copy of the customer's cart, in the order entries were added.
    pub cart: Vec<CartEntry>,
}

/// The details needed to register a customer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewCustomer {
    /// The unique name the customer signs in with.
    pub username: String,
    /// The customer's first name.
    #[serde(default)]
    pub first_name: String,
    /// The customer's last name.
    #[serde(default)]
    pub last_name: String,
}

/// Create the customer table.
///
/// The embedded cart is stored as a JSON array in the `cart` column.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_customer_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS customer (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                cart TEXT NOT NULL DEFAULT '[]'
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new customer with an empty cart into the database.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyUsername] if the username is empty or just whitespace,
/// - [Error::DuplicateUsername] if the username is taken,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_customer(
    new_customer: NewCustomer,
    connection: &Connection,
) -> Result<Customer, Error> {
    let username = new_customer.username.trim();

    if username.is_empty() {
        return Err(Error::EmptyUsername);
    }

    connection
        .execute(
            "INSERT INTO customer (username, first_name, last_name) VALUES (?1, ?2, ?3)",
            (
                username,
                &new_customer.first_name,
                &new_customer.last_name,
            ),
        )
        .map_err(|error| match error {
            error if is_unique_violation(&error) => Error::DuplicateUsername(username.to_owned()),
            error => error.into(),
        })?;

    Ok(Customer {
        id: connection.last_insert_rowid(),
        username: username.to_owned(),
        first_name: new_customer.first_name,
        last_name: new_customer.last_name,
        cart: Vec::new(),
    })
}

/// Get the customer with the ID `customer_id`, including their embedded cart.
///
/// # Errors
///
/// This function will return an error if:
/// - `customer_id` does not belong to a customer ([Error::NotFound]),
/// - there was an error trying to access the store.
pub fn get_customer(customer_id: CustomerId, connection: &Connection) -> Result<Customer, Error> {
    let row = connection
        .prepare(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = :id"
        ))?
        .query_row(&[(":id", &customer_id)], map_customer_row)?;

    decode_cart(row)
}

/// Get every customer, ordered by username.
pub fn get_all_customers(connection: &Connection) -> Result<Vec<Customer>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY username ASC"
        ))?
        .query_map([], map_customer_row)?
        .map(|maybe_row| decode_cart(maybe_row?))
        .collect()
}

/// Whether a customer with the ID `customer_id` exists.
pub fn customer_exists(customer_id: CustomerId, connection: &Connection) -> Result<bool, Error> {
    let found = connection
        .query_row(
            "SELECT 1 FROM customer WHERE id = ?1",
            [customer_id],
            |_| Ok(()),
        )
        .optional()?;

    Ok(found.is_some())
}

/// Read the embedded cart of `customer_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such customer.
pub(crate) fn get_embedded_cart(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartEntry>, Error> {
    let raw_cart: String = connection.query_row(
        "SELECT cart FROM customer WHERE id = ?1",
        [customer_id],
        |row| row.get(0),
    )?;

    Ok(serde_json::from_str(&raw_cart)?)
}

/// Overwrite the embedded cart of `customer_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such customer.
pub(crate) fn set_embedded_cart(
    customer_id: CustomerId,
    cart: &[CartEntry],
    connection: &Connection,
) -> Result<(), Error> {
    let raw_cart = serde_json::to_string(cart)?;

    let rows_affected = connection.execute(
        "UPDATE customer SET cart = ?1 WHERE id = ?2",
        (raw_cart, customer_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_customer_row(row: &Row) -> Result<(Customer, String), rusqlite::Error> {
    let customer = Customer {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        cart: Vec::new(),
    };

    Ok((customer, row.get(4)?))
}

fn decode_cart((mut customer, raw_cart): (Customer, String)) -> Result<Customer, Error> {
    customer.cart = serde_json::from_str(&raw_cart)?;
    Ok(customer)
}
