//! Database operations for items and categories.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    catalog::{
        ALL_CATEGORY, Category, CategoryName, Item, ItemDetails, ItemSnapshot, Memberships,
    },
    database_id::{CategoryId, ItemId},
    db::{begin_immediate, is_unique_violation},
};

const ITEM_COLUMNS: &str = "id, name, description, price, image, categories";

/// Create an item and return it with its generated ID.
///
/// The item always belongs to "All", plus `details.category` if given.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyItemName] if the name is empty,
/// - [Error::CategoryNotFound] if `details.category` does not exist,
/// - [Error::DuplicateItemName] if an item with the same name exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_item(details: ItemDetails, connection: &Connection) -> Result<Item, Error> {
    let name = validate_item_name(&details.name)?;
    let transaction = begin_immediate(connection)?;

    let mut categories = Memberships::new();
    if let Some(category) = &details.category {
        get_category_by_name(category.as_ref(), &transaction)?;
        categories.insert(category);
    }

    let item = transaction
        .prepare(&format!(
            "INSERT INTO item (name, description, price, image, categories)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {ITEM_COLUMNS}"
        ))?
        .query_row(
            (
                &name,
                &details.description,
                details.price,
                &details.image,
                &categories,
            ),
            map_item_row,
        )
        .map_err(|error| match error {
            error if is_unique_violation(&error) => Error::DuplicateItemName(name.clone()),
            error => error.into(),
        })?;

    transaction.commit()?;

    Ok(item)
}

/// Replace an item's display fields, adding it to `details.category` if
/// it is not already a member.
///
/// Existing memberships are kept.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyItemName] if the name is empty,
/// - [Error::NotFound] if `item_id` does not refer to an item,
/// - [Error::CategoryNotFound] if `details.category` does not exist,
/// - [Error::DuplicateItemName] if another item already has the new name,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_item(
    item_id: ItemId,
    details: ItemDetails,
    connection: &Connection,
) -> Result<Item, Error> {
    let name = validate_item_name(&details.name)?;
    let transaction = begin_immediate(connection)?;

    let mut item = get_item(item_id, &transaction)?;
    if let Some(category) = &details.category {
        get_category_by_name(category.as_ref(), &transaction)?;
        item.categories.insert(category);
    }

    item.name = name;
    item.description = details.description;
    item.price = details.price;
    item.image = details.image;

    transaction
        .execute(
            "UPDATE item SET name = ?1, description = ?2, price = ?3, image = ?4, categories = ?5
             WHERE id = ?6",
            (
                &item.name,
                &item.description,
                item.price,
                &item.image,
                &item.categories,
                item.id,
            ),
        )
        .map_err(|error| match error {
            error if is_unique_violation(&error) => Error::DuplicateItemName(item.name.clone()),
            error => error.into(),
        })?;

    transaction.commit()?;

    Ok(item)
}

/// Retrieve a single item by ID.
pub fn get_item(item_id: ItemId, connection: &Connection) -> Result<Item, Error> {
    connection
        .prepare(&format!("SELECT {ITEM_COLUMNS} FROM item WHERE id = :id;"))?
        .query_row(&[(":id", &item_id)], map_item_row)
        .map_err(|error| error.into())
}

/// Retrieve a single item by its unique name.
///
/// # Errors
/// Returns [Error::ItemNotFound] if no item has the name `name`.
pub fn get_item_by_name(name: &str, connection: &Connection) -> Result<Item, Error> {
    connection
        .prepare(&format!("SELECT {ITEM_COLUMNS} FROM item WHERE name = :name;"))?
        .query_row(&[(":name", &name)], map_item_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::ItemNotFound(name.to_owned()),
            error => error.into(),
        })
}

/// Retrieve all items ordered alphabetically by name.
pub fn get_all_items(connection: &Connection) -> Result<Vec<Item>, Error> {
    connection
        .prepare(&format!("SELECT {ITEM_COLUMNS} FROM item ORDER BY name ASC;"))?
        .query_map([], map_item_row)?
        .map(|maybe_item| maybe_item.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the items that belong to the category `name`, ordered by name.
pub fn get_items_in_category(name: &str, connection: &Connection) -> Result<Vec<Item>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM item
             WHERE EXISTS (SELECT 1 FROM json_each(item.categories) WHERE value = :name)
             ORDER BY name ASC;"
        ))?
        .query_map(&[(":name", &name)], map_item_row)?
        .map(|maybe_item| maybe_item.map_err(|error| error.into()))
        .collect()
}

/// Overwrite an item's category memberships.
pub(crate) fn set_item_categories(
    item_id: ItemId,
    categories: &Memberships,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE item SET categories = ?1 WHERE id = ?2",
        (categories, item_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the item named `name`.
///
/// # Errors
/// Returns [Error::ItemNotFound] if no item has the name `name`.
pub fn delete_item_by_name(name: &str, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM item WHERE name = ?1", [name])?;

    if rows_affected == 0 {
        return Err(Error::ItemNotFound(name.to_owned()));
    }

    Ok(())
}

/// Create a category with no members and return it with its generated ID.
///
/// # Errors
/// Returns [Error::DuplicateCategory] if a category with the same name exists.
pub(crate) fn insert_category(
    name: CategoryName,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .execute("INSERT INTO category (name) VALUES (?1);", (name.as_ref(),))
        .map_err(|error| match error {
            error if is_unique_violation(&error) => Error::DuplicateCategory(name.to_string()),
            error => error.into(),
        })?;

    let id = connection.last_insert_rowid();

    Ok(Category { id, name })
}

/// Retrieve a single category by ID.
pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name FROM category WHERE id = :id;")?
        .query_row(&[(":id", &category_id)], map_category_row)
        .map_err(|error| error.into())
}

/// Retrieve a single category by name.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if no category has the name `name`.
pub fn get_category_by_name(name: &str, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name FROM category WHERE name = :name;")?
        .query_row(&[(":name", &name)], map_category_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(name.to_owned()),
            error => error.into(),
        })
}

/// Retrieve all categories ordered alphabetically by name.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name FROM category ORDER BY name ASC;")?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Update a category's name. Does not touch item memberships.
pub(crate) fn update_category_name(
    category_id: CategoryId,
    new_name: &CategoryName,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE category SET name = ?1 WHERE id = ?2",
            (new_name.as_ref(), category_id),
        )
        .map_err(|error| match error {
            error if is_unique_violation(&error) => Error::DuplicateCategory(new_name.to_string()),
            error => error.into(),
        })?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the category row named `name`. Does not touch item memberships.
pub(crate) fn delete_category_row(name: &str, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM category WHERE name = ?1", [name])?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(name.to_owned()));
    }

    Ok(())
}

/// Initialize the item and category tables and create the "All" category.
pub fn create_catalog_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS item (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            price REAL NOT NULL CHECK (price >= 0),
            image TEXT NOT NULL,
            categories TEXT NOT NULL
        );",
    )?;

    connection.execute(
        "INSERT OR IGNORE INTO category (name) VALUES (?1)",
        [ALL_CATEGORY],
    )?;

    Ok(())
}

/// Map the item snapshot columns `name, description, price, image,
/// categories` starting at `offset`.
pub(crate) fn map_snapshot_columns(
    row: &Row,
    offset: usize,
) -> Result<ItemSnapshot, rusqlite::Error> {
    let categories: Memberships = row.get(offset + 4)?;

    Ok(ItemSnapshot {
        name: row.get(offset)?,
        description: row.get(offset + 1)?,
        price: row.get(offset + 2)?,
        image: row.get(offset + 3)?,
        categories: categories.into(),
    })
}

fn validate_item_name(name: &str) -> Result<String, Error> {
    let name = name.trim();

    if name.is_empty() {
        Err(Error::EmptyItemName)
    } else {
        Ok(name.to_owned())
    }
}

fn map_item_row(row: &Row) -> Result<Item, rusqlite::Error> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        image: row.get(4)?,
        categories: row.get(5)?,
    })
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);

    Ok(Category { id, name })
}
