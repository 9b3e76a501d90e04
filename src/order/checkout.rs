//! Turning a customer's cart into orders.
//!
//! A checkout happens in two phases. First the cart is drained and every
//! drained entry is written to the checkout journal, all in one transaction.
//! Then each journal line is settled in its own transaction: the order is
//! placed and the line removed together. A line whose order could not be
//! placed stays in the journal, and [resume_checkout] tries it again later.
//! Orders are keyed by the cart entry they came from, so settling a line twice
//! never creates a second order.

use std::sync::Arc;

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    cart::{CartEntry, Drain, drain_within},
    customer::customer_exists,
    database_id::CustomerId,
    db::begin_immediate,
    idempotency::{KeyedOperation, RequestKey, find_response, record_response},
    order::{
        CheckoutOutcome, CheckoutResult, NewOrder, Order,
        db::{delete_pending_line, get_pending_checkout, insert_order, insert_pending_line},
    },
};

/// Handles the creation of orders during a checkout.
pub trait OrderStore {
    /// Create the order described by `new_order` with the status `processing`.
    ///
    /// Implementers must return the existing order, and create nothing, when
    /// an order already exists for `new_order.source_entry_id`.
    fn place(&self, new_order: &NewOrder, connection: &Connection) -> Result<Order, Error>;
}

/// An [OrderStore] that can be shared between request handlers.
pub type SharedOrderStore = Arc<dyn OrderStore + Send + Sync>;

/// Stores orders in the application's SQLite database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SQLiteOrderStore;

impl OrderStore for SQLiteOrderStore {
    fn place(&self, new_order: &NewOrder, connection: &Connection) -> Result<Order, Error> {
        insert_order(new_order, OffsetDateTime::now_utc(), connection)
    }
}

/// Empty the cart of `customer_id` and place one order per entry, in the
/// order the entries were added.
///
/// Lines left in the checkout journal by an earlier, interrupted checkout are
/// settled as well and their orders come first in the result.
///
/// If `request_key` was already used for a checkout by this customer, the
/// orders from that checkout are returned and nothing is changed.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if the customer does not exist,
/// - [Error::DrainFailed] if the cart was inconsistent, in which case it was
///   repaired and nothing was drained,
/// - [Error::PartialOrderFailure] if some orders could not be placed, those
///   lines stay in the checkout journal for [resume_checkout],
/// - [Error::StoreUnavailable] if the store timed out,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn place_from_cart(
    customer_id: CustomerId,
    request_key: Option<&RequestKey>,
    store: &dyn OrderStore,
    connection: &Connection,
) -> Result<Vec<Order>, Error> {
    let transaction = begin_immediate(connection)?;

    if let Some(key) = request_key
        && let Some(previous) =
            find_response(customer_id, KeyedOperation::Checkout, key, &transaction)?
    {
        tracing::debug!("replaying checkout for customer {customer_id}");
        return Ok(previous);
    }

    let entries = match drain_within(customer_id, &transaction)? {
        Drain::Drained(entries) => entries,
        Drain::Repaired(repairs) => {
            transaction.commit()?;
            return Err(Error::DrainFailed(repairs));
        }
    };

    for entry in &entries {
        insert_pending_line(entry, &transaction)?;
    }

    transaction.commit()?;
    tracing::info!(
        "drained {} entries from the cart of customer {customer_id}",
        entries.len()
    );

    let orders = settle_journal(customer_id, store, connection)?.into_result()?;

    if let Some(key) = request_key {
        let transaction = begin_immediate(connection)?;
        record_response(
            customer_id,
            KeyedOperation::Checkout,
            key,
            &orders,
            &transaction,
        )?;
        transaction.commit()?;
    }

    Ok(orders)
}

/// Place the orders for the checkout journal lines of `customer_id` left
/// behind by an interrupted or partially failed checkout.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if the customer does not exist,
/// - [Error::PartialOrderFailure] if some orders still could not be placed,
/// - [Error::StoreUnavailable] if the store timed out,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn resume_checkout(
    customer_id: CustomerId,
    store: &dyn OrderStore,
    connection: &Connection,
) -> Result<Vec<Order>, Error> {
    if !customer_exists(customer_id, connection)? {
        return Err(Error::NotFound);
    }

    settle_journal(customer_id, store, connection)?.into_result()
}

/// The orders placed while settling the journal and what happened to each line.
struct Settlement {
    orders: Vec<Order>,
    outcomes: Vec<CheckoutOutcome>,
}

impl Settlement {
    fn into_result(self) -> Result<Vec<Order>, Error> {
        if self.outcomes.iter().all(CheckoutOutcome::is_placed) {
            Ok(self.orders)
        } else {
            Err(Error::PartialOrderFailure(self.outcomes))
        }
    }
}

fn settle_journal(
    customer_id: CustomerId,
    store: &dyn OrderStore,
    connection: &Connection,
) -> Result<Settlement, Error> {
    let lines = get_pending_checkout(customer_id, connection)?;
    let mut settlement = Settlement {
        orders: Vec::with_capacity(lines.len()),
        outcomes: Vec::with_capacity(lines.len()),
    };

    for line in lines {
        let result = match settle_line(&line, store, connection) {
            Ok(order) => {
                let order_id = order.id;
                settlement.orders.push(order);
                CheckoutResult::Placed { order_id }
            }
            Err(error) => {
                tracing::warn!(
                    "could not place the order for cart entry {} of customer {customer_id}: \
                     {error}",
                    line.id
                );
                CheckoutResult::Failed {
                    reason: error.to_string(),
                }
            }
        };

        settlement.outcomes.push(CheckoutOutcome {
            entry_id: line.id,
            item_name: line.item.name,
            result,
        });
    }

    Ok(settlement)
}

fn settle_line(
    line: &CartEntry,
    store: &dyn OrderStore,
    connection: &Connection,
) -> Result<Order, Error> {
    let transaction = begin_immediate(connection)?;

    let order = store.place(
        &NewOrder {
            customer_id: line.customer_id,
            item: line.item.clone(),
            quantity: line.quantity,
            source_entry_id: Some(line.id),
        },
        &transaction,
    )?;
    delete_pending_line(line.id, &transaction)?;

    transaction.commit()?;

    Ok(order)
}

#[cfg(test)]
mod checkout_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        cart::{Resolution, add_or_merge, get_cart},
        catalog::{ItemSnapshot, test_utils::create_test_item},
        customer::test_utils::create_test_customer,
        database_id::CustomerId,
        db::initialize,
        idempotency::RequestKey,
        order::{
            CheckoutResult, NewOrder, Order, OrderStatus, get_pending_checkout, list_all,
        },
    };

    use super::{OrderStore, SQLiteOrderStore, place_from_cart, resume_checkout};

    /// Fails to place orders for one item and places the rest normally.
    struct FailingOrderStore {
        failing_item: &'static str,
    }

    impl OrderStore for FailingOrderStore {
        fn place(&self, new_order: &NewOrder, connection: &Connection) -> Result<Order, Error> {
            if new_order.item.name == self.failing_item {
                Err(Error::StoreUnavailable)
            } else {
                SQLiteOrderStore.place(new_order, connection)
            }
        }
    }

    struct Fixture {
        connection: Connection,
        customer_id: CustomerId,
        tea: ItemSnapshot,
        cake: ItemSnapshot,
    }

    fn setup() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        let customer_id = create_test_customer("ada", &connection).id;
        let tea = create_test_item("Tea", None, &connection).snapshot();
        let cake = create_test_item("Cake", None, &connection).snapshot();

        Fixture {
            connection,
            customer_id,
            tea,
            cake,
        }
    }

    fn add(fixture: &Fixture, item: &ItemSnapshot, quantity: i64) {
        add_or_merge(
            fixture.customer_id,
            item.clone(),
            quantity,
            None,
            &fixture.connection,
        )
        .expect("Could not add to cart");
    }

    fn names_and_quantities(orders: &[Order]) -> Vec<(String, i64)> {
        orders
            .iter()
            .map(|order| (order.item.name.clone(), order.quantity.get()))
            .collect()
    }

    #[test]
    fn checkout_places_one_order_per_entry_in_cart_order() {
        let fixture = setup();
        add(&fixture, &fixture.tea, 2);
        add(&fixture, &fixture.cake, 1);

        let orders = place_from_cart(
            fixture.customer_id,
            None,
            &SQLiteOrderStore,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            names_and_quantities(&orders),
            vec![("Tea".to_owned(), 2), ("Cake".to_owned(), 1)]
        );
        assert!(
            orders
                .iter()
                .all(|order| order.status == OrderStatus::Processing
                    && order.source_entry_id.is_some())
        );
        assert_eq!(get_cart(fixture.customer_id, &fixture.connection), Ok(vec![]));
        assert_eq!(
            get_pending_checkout(fixture.customer_id, &fixture.connection),
            Ok(vec![])
        );
    }

    #[test]
    fn checkout_of_empty_cart_places_nothing() {
        let fixture = setup();

        let orders = place_from_cart(
            fixture.customer_id,
            None,
            &SQLiteOrderStore,
            &fixture.connection,
        );

        assert_eq!(orders, Ok(vec![]));
        assert_eq!(list_all(&fixture.connection), Ok(vec![]));
    }

    #[test]
    fn checkout_of_inconsistent_cart_repairs_and_drains_nothing() {
        let fixture = setup();
        add(&fixture, &fixture.tea, 2);
        add(&fixture, &fixture.cake, 1);
        fixture
            .connection
            .execute("DELETE FROM cart_entry WHERE item_name = 'Cake'", [])
            .unwrap();

        let result = place_from_cart(
            fixture.customer_id,
            None,
            &SQLiteOrderStore,
            &fixture.connection,
        );

        let Err(Error::DrainFailed(repairs)) = result else {
            panic!("want DrainFailed, got {result:?}");
        };
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].item_name, "Cake");
        assert_eq!(repairs[0].standalone, None);
        assert!(matches!(repairs[0].resolution, Resolution::Restored { .. }));
        assert_eq!(
            get_cart(fixture.customer_id, &fixture.connection).map(|cart| cart.len()),
            Ok(2)
        );
        assert_eq!(list_all(&fixture.connection), Ok(vec![]));

        let retried = place_from_cart(
            fixture.customer_id,
            None,
            &SQLiteOrderStore,
            &fixture.connection,
        )
        .unwrap();
        assert_eq!(retried.len(), 2);
    }

    #[test]
    fn failed_orders_stay_in_journal_until_resumed() {
        let fixture = setup();
        add(&fixture, &fixture.tea, 2);
        add(&fixture, &fixture.cake, 3);

        let result = place_from_cart(
            fixture.customer_id,
            None,
            &FailingOrderStore {
                failing_item: "Cake",
            },
            &fixture.connection,
        );

        let Err(Error::PartialOrderFailure(outcomes)) = result else {
            panic!("want PartialOrderFailure, got {result:?}");
        };
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_placed());
        assert_eq!(outcomes[1].item_name, "Cake");
        assert_eq!(
            outcomes[1].result,
            CheckoutResult::Failed {
                reason: Error::StoreUnavailable.to_string()
            }
        );
        assert_eq!(get_cart(fixture.customer_id, &fixture.connection), Ok(vec![]));
        let pending = get_pending_checkout(fixture.customer_id, &fixture.connection).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].item.name, "Cake");

        let resumed =
            resume_checkout(fixture.customer_id, &SQLiteOrderStore, &fixture.connection)
                .unwrap();

        assert_eq!(names_and_quantities(&resumed), vec![("Cake".to_owned(), 3)]);
        assert_eq!(
            names_and_quantities(&list_all(&fixture.connection).unwrap()),
            vec![("Tea".to_owned(), 2), ("Cake".to_owned(), 3)]
        );
        assert_eq!(
            get_pending_checkout(fixture.customer_id, &fixture.connection),
            Ok(vec![])
        );
    }

    #[test]
    fn resume_with_empty_journal_places_nothing() {
        let fixture = setup();

        let resumed =
            resume_checkout(fixture.customer_id, &SQLiteOrderStore, &fixture.connection);

        assert_eq!(resumed, Ok(vec![]));
    }

    #[test]
    fn resume_for_missing_customer_returns_not_found() {
        let fixture = setup();

        let resumed = resume_checkout(42, &SQLiteOrderStore, &fixture.connection);

        assert_eq!(resumed, Err(Error::NotFound));
    }

    #[test]
    fn checkout_with_reused_key_replays_orders() {
        let fixture = setup();
        let key = RequestKey::new("checkout-1").unwrap();
        add(&fixture, &fixture.tea, 1);

        let first = place_from_cart(
            fixture.customer_id,
            Some(&key),
            &SQLiteOrderStore,
            &fixture.connection,
        )
        .unwrap();
        add(&fixture, &fixture.cake, 1);
        let second = place_from_cart(
            fixture.customer_id,
            Some(&key),
            &SQLiteOrderStore,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(list_all(&fixture.connection).map(|orders| orders.len()), Ok(1));
        assert_eq!(
            get_cart(fixture.customer_id, &fixture.connection).map(|cart| cart.len()),
            Ok(1)
        );
    }

    #[test]
    fn checkout_for_missing_customer_returns_not_found() {
        let fixture = setup();

        let result = place_from_cart(42, None, &SQLiteOrderStore, &fixture.connection);

        assert_eq!(result, Err(Error::NotFound));
    }
}
