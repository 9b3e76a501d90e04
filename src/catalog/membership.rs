//! Category membership management.
//!
//! Items reference categories by name, so renaming or deleting a category
//! fans out to every item that carries the name. Each fan-out runs in a
//! single transaction together with the change to the category itself, so no
//! item is ever left referencing a category that does not exist.

use rusqlite::Connection;

use crate::{
    Error,
    catalog::{
        BatchOutcome, BatchReport, Category, CategoryChange, CategoryName, StaleMembership,
        db::{
            self, delete_category_row, get_all_items, get_category, get_category_by_name,
            get_item_by_name, get_items_in_category, set_item_categories, update_category_name,
        },
    },
    database_id::CategoryId,
    db::begin_immediate,
};

/// Create a category and add the items named in `selected_items` to it.
///
/// Unknown item names are reported in the returned assignments and do not
/// prevent the category from being created.
///
/// # Errors
/// Returns [Error::DuplicateCategory] if a category named `name` exists.
pub fn create_category(
    name: CategoryName,
    selected_items: &[String],
    connection: &Connection,
) -> Result<CategoryChange, Error> {
    let transaction = begin_immediate(connection)?;

    let category = db::insert_category(name, &transaction)?;
    let assignments = assign_within(&category.name, selected_items, &transaction)?;

    transaction.commit()?;

    tracing::info!(
        "created category \"{}\" with {} item(s)",
        category.name,
        assignments.0.iter().filter(|outcome| outcome.is_success()).count()
    );

    Ok(CategoryChange {
        category,
        assignments,
    })
}

/// Add the category `category_name` to each item named in `item_names`.
///
/// Items that already belong to the category are left untouched.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if the category does not exist, unknown
/// item names are reported per name instead.
pub fn assign_items(
    category_name: &str,
    item_names: &[String],
    connection: &Connection,
) -> Result<BatchReport, Error> {
    let transaction = begin_immediate(connection)?;

    let category = get_category_by_name(category_name, &transaction)?;
    let report = assign_within(&category.name, item_names, &transaction)?;

    transaction.commit()?;

    Ok(report)
}

/// Rename a category, carrying every item's membership over to the new name,
/// then add the items named in `selected_items`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `category_id` does not refer to a category,
/// - [Error::ProtectedCategory] if the category is "All",
/// - [Error::DuplicateCategory] if another category is already named `new_name`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn rename_category(
    category_id: CategoryId,
    new_name: CategoryName,
    selected_items: &[String],
    connection: &Connection,
) -> Result<CategoryChange, Error> {
    let transaction = begin_immediate(connection)?;

    let category = get_category(category_id, &transaction)?;
    if category.name.is_all() {
        return Err(Error::ProtectedCategory);
    }

    if new_name != category.name {
        match get_category_by_name(new_name.as_ref(), &transaction) {
            Ok(_) => return Err(Error::DuplicateCategory(new_name.to_string())),
            Err(Error::CategoryNotFound(_)) => {}
            Err(error) => return Err(error),
        }
    }

    let mut renamed_count = 0;
    for mut item in get_all_items(&transaction)? {
        if item.categories.rename(category.name.as_ref(), &new_name) {
            set_item_categories(item.id, &item.categories, &transaction)?;
            renamed_count += 1;
        }
    }

    update_category_name(category.id, &new_name, &transaction)?;
    let assignments = assign_within(&new_name, selected_items, &transaction)?;

    transaction.commit()?;

    tracing::info!(
        "renamed category \"{}\" to \"{new_name}\", updating {renamed_count} item(s)",
        category.name
    );

    Ok(CategoryChange {
        category: Category {
            id: category.id,
            name: new_name,
        },
        assignments,
    })
}

/// Delete each category named in `names`, removing it from every item.
///
/// Each deletion is independent, a failure for one name does not stop the
/// others. "All" cannot be deleted.
pub fn delete_categories(names: &[String], connection: &Connection) -> BatchReport {
    let outcomes = names
        .iter()
        .map(|name| match delete_category(name, connection) {
            Ok(()) => BatchOutcome::succeeded(name),
            Err(error) => {
                tracing::warn!("could not delete category \"{name}\": {error}");
                BatchOutcome::failed(name, &error)
            }
        })
        .collect();

    BatchReport(outcomes)
}

/// Delete each item named in `names`.
///
/// Each deletion is independent, a failure for one name does not stop the
/// others. Cart entries and orders keep their snapshots of deleted items.
pub fn delete_items(names: &[String], connection: &Connection) -> BatchReport {
    let outcomes = names
        .iter()
        .map(|name| match db::delete_item_by_name(name, connection) {
            Ok(()) => BatchOutcome::succeeded(name),
            Err(error) => {
                tracing::warn!("could not delete item \"{name}\": {error}");
                BatchOutcome::failed(name, &error)
            }
        })
        .collect();

    BatchReport(outcomes)
}

/// Find every item that references a category name with no matching category.
pub fn find_stale_memberships(connection: &Connection) -> Result<Vec<StaleMembership>, Error> {
    connection
        .prepare(
            "SELECT item.name, membership.value
             FROM item, json_each(item.categories) AS membership
             WHERE membership.value NOT IN (SELECT name FROM category)
             ORDER BY item.name, membership.value;",
        )?
        .query_map([], |row| {
            Ok(StaleMembership {
                item: row.get(0)?,
                category: row.get(1)?,
            })
        })?
        .map(|maybe_stale| maybe_stale.map_err(|error| error.into()))
        .collect()
}

fn delete_category(name: &str, connection: &Connection) -> Result<(), Error> {
    let name = CategoryName::new(name)?;
    if name.is_all() {
        return Err(Error::ProtectedCategory);
    }

    let transaction = begin_immediate(connection)?;

    delete_category_row(name.as_ref(), &transaction)?;
    for mut item in get_items_in_category(name.as_ref(), &transaction)? {
        item.categories.remove(name.as_ref());
        set_item_categories(item.id, &item.categories, &transaction)?;
    }

    transaction.commit()?;

    Ok(())
}

fn assign_within(
    category: &CategoryName,
    item_names: &[String],
    connection: &Connection,
) -> Result<BatchReport, Error> {
    let mut outcomes = Vec::with_capacity(item_names.len());

    for name in item_names {
        match get_item_by_name(name, connection) {
            Ok(mut item) => {
                if item.categories.insert(category) {
                    set_item_categories(item.id, &item.categories, connection)?;
                }
                outcomes.push(BatchOutcome::succeeded(name));
            }
            Err(error @ Error::ItemNotFound(_)) => {
                outcomes.push(BatchOutcome::failed(name, &error));
            }
            Err(error) => return Err(error),
        }
    }

    Ok(BatchReport(outcomes))
}

#[cfg(test)]
mod membership_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        catalog::{
            ALL_CATEGORY, BatchOutcome, CategoryName, get_all_categories, get_category_by_name,
            get_item_by_name, get_items_in_category, test_utils::create_test_item,
        },
        db::initialize,
    };

    use super::{
        assign_items, create_category, delete_categories, delete_items, find_stale_memberships,
        rename_category,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn create_category_assigns_selected_items() {
        let connection = get_test_connection();
        create_test_item("Tea", None, &connection);
        create_test_item("Coffee", None, &connection);

        let change = create_category(
            CategoryName::new_unchecked("Drinks"),
            &names(&["Tea", "Coffee"]),
            &connection,
        )
        .expect("Could not create category");

        assert!(change.assignments.all_succeeded());
        assert_eq!(
            get_items_in_category("Drinks", &connection).unwrap().len(),
            2
        );
    }

    #[test]
    fn create_category_fails_on_duplicate_without_side_effects() {
        let connection = get_test_connection();
        create_test_item("Tea", None, &connection);
        create_category(CategoryName::new_unchecked("Drinks"), &[], &connection).unwrap();

        let result = create_category(
            CategoryName::new_unchecked("Drinks"),
            &names(&["Tea"]),
            &connection,
        );

        assert_eq!(result, Err(Error::DuplicateCategory("Drinks".to_owned())));
        assert!(get_items_in_category("Drinks", &connection).unwrap().is_empty());
    }

    #[test]
    fn assign_items_reports_unknown_items_and_is_idempotent() {
        let connection = get_test_connection();
        create_test_item("Tea", None, &connection);
        create_category(CategoryName::new_unchecked("Drinks"), &[], &connection).unwrap();

        let report = assign_items("Drinks", &names(&["Tea", "Ghost", "Tea"]), &connection)
            .expect("Could not assign items");

        assert_eq!(report.0.len(), 3);
        assert_eq!(
            report.failures().cloned().collect::<Vec<_>>(),
            vec![BatchOutcome::failed(
                "Ghost",
                &Error::ItemNotFound("Ghost".to_owned())
            )]
        );
        let tea = get_item_by_name("Tea", &connection).unwrap();
        assert_eq!(
            tea.categories.iter().collect::<Vec<_>>(),
            vec![ALL_CATEGORY, "Drinks"]
        );
    }

    #[test]
    fn assign_items_to_unknown_category_fails() {
        let connection = get_test_connection();

        let result = assign_items("Drinks", &names(&["Tea"]), &connection);

        assert_eq!(result, Err(Error::CategoryNotFound("Drinks".to_owned())));
    }

    #[test]
    fn rename_moves_every_member_to_new_name() {
        let connection = get_test_connection();
        let drinks =
            create_category(CategoryName::new_unchecked("Drinks"), &[], &connection).unwrap();
        for name in ["Tea", "Coffee", "Juice"] {
            create_test_item(name, Some("Drinks"), &connection);
        }
        create_test_item("Water", None, &connection);
        create_test_item("Chips", None, &connection);

        let change = rename_category(
            drinks.category.id,
            CategoryName::new_unchecked("Beverages"),
            &names(&["Water"]),
            &connection,
        )
        .expect("Could not rename category");

        assert_eq!(change.category.name.as_ref(), "Beverages");
        assert!(get_items_in_category("Drinks", &connection).unwrap().is_empty());
        let beverages: Vec<String> = get_items_in_category("Beverages", &connection)
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(beverages, names(&["Coffee", "Juice", "Tea", "Water"]));
        assert_eq!(find_stale_memberships(&connection), Ok(vec![]));
    }

    #[test]
    fn rename_to_existing_name_fails_without_side_effects() {
        let connection = get_test_connection();
        let drinks =
            create_category(CategoryName::new_unchecked("Drinks"), &[], &connection).unwrap();
        create_category(CategoryName::new_unchecked("Snacks"), &[], &connection).unwrap();
        create_test_item("Tea", Some("Drinks"), &connection);

        let result = rename_category(
            drinks.category.id,
            CategoryName::new_unchecked("Snacks"),
            &[],
            &connection,
        );

        assert_eq!(result, Err(Error::DuplicateCategory("Snacks".to_owned())));
        assert_eq!(
            get_items_in_category("Drinks", &connection).unwrap().len(),
            1
        );
    }

    #[test]
    fn rename_to_same_name_only_assigns_selected_items() {
        let connection = get_test_connection();
        let drinks =
            create_category(CategoryName::new_unchecked("Drinks"), &[], &connection).unwrap();
        create_test_item("Tea", Some("Drinks"), &connection);
        create_test_item("Water", None, &connection);

        rename_category(
            drinks.category.id,
            CategoryName::new_unchecked("Drinks"),
            &names(&["Water"]),
            &connection,
        )
        .expect("Could not rename category");

        assert_eq!(
            get_items_in_category("Drinks", &connection).unwrap().len(),
            2
        );
    }

    #[test]
    fn all_category_cannot_be_renamed() {
        let connection = get_test_connection();
        let all = get_category_by_name(ALL_CATEGORY, &connection).unwrap();

        let result = rename_category(
            all.id,
            CategoryName::new_unchecked("Everything"),
            &[],
            &connection,
        );

        assert_eq!(result, Err(Error::ProtectedCategory));
    }

    #[test]
    fn delete_categories_reports_missing_names_independently() {
        let connection = get_test_connection();
        create_category(CategoryName::new_unchecked("Drinks"), &[], &connection).unwrap();
        create_test_item("Tea", Some("Drinks"), &connection);

        let report = delete_categories(&names(&["Snacks", "Drinks", ALL_CATEGORY]), &connection);

        assert_eq!(
            report.0,
            vec![
                BatchOutcome::failed("Snacks", &Error::CategoryNotFound("Snacks".to_owned())),
                BatchOutcome::succeeded("Drinks"),
                BatchOutcome::failed(ALL_CATEGORY, &Error::ProtectedCategory),
            ]
        );
        let remaining: Vec<String> = get_all_categories(&connection)
            .unwrap()
            .into_iter()
            .map(|category| category.name.to_string())
            .collect();
        assert_eq!(remaining, names(&[ALL_CATEGORY]));
        let tea = get_item_by_name("Tea", &connection).unwrap();
        assert!(!tea.categories.contains("Drinks"));
        assert_eq!(find_stale_memberships(&connection), Ok(vec![]));
    }

    #[test]
    fn delete_items_reports_per_name() {
        let connection = get_test_connection();
        create_test_item("Tea", None, &connection);

        let report = delete_items(&names(&["Tea", "Ghost"]), &connection);

        assert_eq!(
            report.0,
            vec![
                BatchOutcome::succeeded("Tea"),
                BatchOutcome::failed("Ghost", &Error::ItemNotFound("Ghost".to_owned())),
            ]
        );
        assert_eq!(
            get_item_by_name("Tea", &connection),
            Err(Error::ItemNotFound("Tea".to_owned()))
        );
    }

    #[test]
    fn stale_memberships_are_found() {
        let connection = get_test_connection();
        let tea = create_test_item("Tea", None, &connection);
        connection
            .execute(
                "UPDATE item SET categories = '[\"All\",\"Drinks\"]' WHERE id = ?1",
                [tea.id],
            )
            .unwrap();

        let stale = find_stale_memberships(&connection).unwrap();

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].item, "Tea");
        assert_eq!(stale[0].category, "Drinks");
    }
}
