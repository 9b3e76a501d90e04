//! Keeps the embedded cart and the standalone cart records in agreement.
//!
//! Every operation here reads both copies of the entries it touches, and
//! writes the embedded copy and then the standalone copy, inside a single
//! immediate transaction. Either both writes land or neither does.
//!
//! When an operation finds the two copies of an entry disagreeing (a
//! missing copy or different quantities), it repairs the entry so that the
//! higher quantity wins, commits the repair and reports it.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::{
    Error,
    cart::{
        AddedToCart, CartEntry, CartRepair, Quantity, Resolution,
        db::{
            delete_cart_record, delete_cart_records, get_cart_record,
            get_cart_record_by_item_name, get_cart_records, insert_cart_record,
            set_cart_record_quantity,
        },
    },
    catalog::ItemSnapshot,
    customer::{get_embedded_cart, set_embedded_cart},
    database_id::{CartEntryId, CustomerId},
    db::{begin_immediate, next_id},
    idempotency::{KeyedOperation, RequestKey, find_response, record_response},
};

const CART_ENTRY_SEQUENCE: &str = "cart_entry";

/// The copies of one cart entry that exist.
#[derive(Debug, Clone, PartialEq)]
enum EntryPair {
    Both {
        embedded: CartEntry,
        standalone: CartEntry,
    },
    EmbeddedOnly(CartEntry),
    StandaloneOnly(CartEntry),
}

impl EntryPair {
    fn new(embedded: Option<CartEntry>, standalone: Option<CartEntry>) -> Option<Self> {
        match (embedded, standalone) {
            (Some(embedded), Some(standalone)) => Some(Self::Both {
                embedded,
                standalone,
            }),
            (Some(embedded), None) => Some(Self::EmbeddedOnly(embedded)),
            (None, Some(standalone)) => Some(Self::StandaloneOnly(standalone)),
            (None, None) => None,
        }
    }

    fn is_consistent(&self) -> bool {
        match self {
            Self::Both {
                embedded,
                standalone,
            } => embedded.quantity == standalone.quantity,
            _ => false,
        }
    }

    /// The entry the copies describe, preferring the embedded copy.
    fn entry(&self) -> &CartEntry {
        match self {
            Self::Both { embedded, .. } | Self::EmbeddedOnly(embedded) => embedded,
            Self::StandaloneOnly(standalone) => standalone,
        }
    }

    fn has_standalone(&self) -> bool {
        !matches!(self, Self::EmbeddedOnly(_))
    }

    fn quantities(&self) -> (Option<Quantity>, Option<Quantity>) {
        match self {
            Self::Both {
                embedded,
                standalone,
            } => (Some(embedded.quantity), Some(standalone.quantity)),
            Self::EmbeddedOnly(embedded) => (Some(embedded.quantity), None),
            Self::StandaloneOnly(standalone) => (None, Some(standalone.quantity)),
        }
    }

    /// The higher of the two quantities, a missing copy counts as zero.
    fn repaired_quantity(&self) -> Quantity {
        match self {
            Self::Both {
                embedded,
                standalone,
            } => embedded.quantity.max(standalone.quantity),
            Self::EmbeddedOnly(entry) | Self::StandaloneOnly(entry) => entry.quantity,
        }
    }

    fn describe(&self, resolution: Resolution) -> CartRepair {
        let entry = self.entry();
        let (embedded, standalone) = self.quantities();

        CartRepair {
            entry_id: entry.id,
            item_name: entry.item.name.clone(),
            embedded,
            standalone,
            resolution,
        }
    }

    /// The repair that restores both copies with the higher quantity.
    fn planned_repair(&self) -> CartRepair {
        self.describe(Resolution::Restored {
            quantity: self.repaired_quantity(),
        })
    }
}

/// Add `quantity` units of `item` to the cart of `customer_id`.
///
/// If the cart already has an entry for an item with the same name, its
/// quantity is increased, otherwise a new entry is created. If the existing
/// entry's two copies disagree they are repaired first and the repair is
/// included in the result.
///
/// If `request_key` was already used for this operation by this customer,
/// the stored result is returned and the cart is not changed.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidQuantity] if `quantity` is less than one,
/// - [Error::NotFound] if the customer does not exist,
/// - [Error::StoreUnavailable] if the store timed out, in which case nothing was written,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_or_merge(
    customer_id: CustomerId,
    item: ItemSnapshot,
    quantity: i64,
    request_key: Option<&RequestKey>,
    connection: &Connection,
) -> Result<AddedToCart, Error> {
    let quantity = Quantity::new(quantity)?;
    let transaction = begin_immediate(connection)?;

    if let Some(key) = request_key
        && let Some(previous) =
            find_response(customer_id, KeyedOperation::AddToCart, key, &transaction)?
    {
        return Ok(previous);
    }

    let mut cart = get_embedded_cart(customer_id, &transaction)?;
    let embedded = cart.iter().find(|entry| entry.item.name == item.name).cloned();
    let standalone = match &embedded {
        Some(entry) => get_cart_record(customer_id, entry.id, &transaction)?,
        None => get_cart_record_by_item_name(customer_id, &item.name, &transaction)?,
    };

    let added = match EntryPair::new(embedded, standalone) {
        None => {
            let entry = CartEntry {
                id: next_id(CART_ENTRY_SEQUENCE, &transaction)?,
                customer_id,
                item,
                quantity,
            };

            cart.push(entry.clone());
            set_embedded_cart(customer_id, &cart, &transaction)?;
            insert_cart_record(&entry, &transaction)?;

            tracing::debug!("added {} to the cart of customer {customer_id}", entry.item.name);
            AddedToCart { entry, repair: None }
        }
        Some(pair) => {
            let repair = if pair.is_consistent() {
                None
            } else {
                Some(reconcile(customer_id, &pair, &mut cart, &transaction)?)
            };

            let entry = {
                let entry = entry_mut(&mut cart, pair.entry().id)?;
                entry.quantity = entry.quantity.plus(quantity)?;
                entry.clone()
            };

            set_embedded_cart(customer_id, &cart, &transaction)?;
            set_cart_record_quantity(entry.id, entry.quantity, &transaction)?;

            AddedToCart { entry, repair }
        }
    };

    if let Some(key) = request_key {
        record_response(
            customer_id,
            KeyedOperation::AddToCart,
            key,
            &added,
            &transaction,
        )?;
    }

    transaction.commit()?;

    Ok(added)
}

/// Add one to the quantity of the entry `entry_id`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EntryNotFound] if neither copy of the entry exists,
/// - [Error::EntryInconsistent] if the two copies disagreed, in which case
///   they were repaired but the quantity was not changed,
/// - [Error::StoreUnavailable] if the store timed out, in which case nothing was written,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn increment(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<CartEntry, Error> {
    adjust_quantity(customer_id, entry_id, connection, |quantity| {
        quantity.plus(Quantity::ONE).map(Some)
    })
}

/// Subtract one from the quantity of the entry `entry_id`.
///
/// An entry with a quantity of one is left unchanged, use [remove] to take
/// it out of the cart.
///
/// # Errors
///
/// Returns the same errors as [increment].
pub fn decrement(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<CartEntry, Error> {
    adjust_quantity(customer_id, entry_id, connection, |quantity| {
        Ok(quantity.decrement())
    })
}

/// Remove the entry `entry_id` from both copies of the cart and return it.
///
/// Copies whose quantities differ are both removed and the disagreement is
/// logged. If only
/// one copy existed it is removed and [Error::EntryInconsistent] reports
/// that the other was missing.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EntryNotFound] if neither copy of the entry exists,
/// - [Error::EntryInconsistent] if only one copy existed, which has been removed,
/// - [Error::StoreUnavailable] if the store timed out, in which case nothing was written,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn remove(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<CartEntry, Error> {
    let transaction = begin_immediate(connection)?;
    let mut cart = get_embedded_cart(customer_id, &transaction)?;
    let pair = load_pair(customer_id, entry_id, &cart, &transaction)?
        .ok_or(Error::EntryNotFound(entry_id))?;

    if !matches!(pair, EntryPair::StandaloneOnly(_)) {
        cart.retain(|entry| entry.id != entry_id);
        set_embedded_cart(customer_id, &cart, &transaction)?;
    }

    if pair.has_standalone() {
        delete_cart_record(entry_id, &transaction)?;
    }

    transaction.commit()?;

    if let EntryPair::Both {
        embedded,
        standalone,
    } = pair
    {
        if embedded.quantity != standalone.quantity {
            tracing::warn!(
                "removed cart entry {entry_id} of customer {customer_id} whose copies disagreed: \
                 embedded quantity {}, standalone quantity {}",
                embedded.quantity,
                standalone.quantity
            );
        }
        return Ok(embedded);
    }

    tracing::warn!(
        "removed cart entry {entry_id} of customer {customer_id} that was only stored in one place"
    );
    Err(Error::EntryInconsistent(pair.describe(Resolution::Removed)))
}

/// Empty the cart of `customer_id` and return what was in it, oldest entry first.
///
/// # Errors
///
/// This function will return a:
/// - [Error::DrainFailed] if any entry's copies disagreed, in which case those
///   entries were repaired and nothing was removed,
/// - [Error::NotFound] if the customer does not exist,
/// - [Error::StoreUnavailable] if the store timed out, in which case nothing was written,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn drain_for_order(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartEntry>, Error> {
    let transaction = begin_immediate(connection)?;
    let drain = drain_within(customer_id, &transaction)?;
    transaction.commit()?;

    drain.into_result()
}

/// The result of emptying a cart inside a caller's transaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Drain {
    /// Both copies of the cart were emptied, these are the entries.
    Drained(Vec<CartEntry>),
    /// Inconsistent entries were repaired instead, nothing was removed.
    Repaired(Vec<CartRepair>),
}

impl Drain {
    pub(crate) fn into_result(self) -> Result<Vec<CartEntry>, Error> {
        match self {
            Drain::Drained(entries) => Ok(entries),
            Drain::Repaired(repairs) => Err(Error::DrainFailed(repairs)),
        }
    }
}

/// Empty the cart of `customer_id` using the caller's transaction.
///
/// The caller should commit in both outcomes, a [Drain::Repaired] result
/// means the repairs were written and should be kept.
pub(crate) fn drain_within(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Drain, Error> {
    let mut cart = get_embedded_cart(customer_id, connection)?;
    let records = get_cart_records(customer_id, connection)?;

    let inconsistent: Vec<EntryPair> = pair_entries(&cart, records)
        .into_iter()
        .filter(|pair| !pair.is_consistent())
        .collect();

    if !inconsistent.is_empty() {
        let repairs = inconsistent
            .iter()
            .map(|pair| reconcile(customer_id, pair, &mut cart, connection))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::warn!(
            "could not drain the cart of customer {customer_id}, repaired {} entries",
            repairs.len()
        );
        return Ok(Drain::Repaired(repairs));
    }

    set_embedded_cart(customer_id, &[], connection)?;
    delete_cart_records(customer_id, connection)?;

    Ok(Drain::Drained(cart))
}

/// Get the cart of `customer_id` as stored in the customer's record.
///
/// # Errors
///
/// Returns [Error::NotFound] if the customer does not exist.
pub fn get_cart(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartEntry>, Error> {
    get_embedded_cart(customer_id, connection)
}

/// Get the standalone record for the entry `entry_id`.
///
/// # Errors
///
/// Returns [Error::EntryNotFound] if the record does not exist.
pub fn get_cart_entry(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    connection: &Connection,
) -> Result<CartEntry, Error> {
    get_cart_record(customer_id, entry_id, connection)?.ok_or(Error::EntryNotFound(entry_id))
}

/// List the entries whose two copies disagree and how [repair_cart] would
/// fix them, without changing anything.
pub fn audit_cart(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartRepair>, Error> {
    let cart = get_embedded_cart(customer_id, connection)?;
    let records = get_cart_records(customer_id, connection)?;

    Ok(pair_entries(&cart, records)
        .iter()
        .filter(|pair| !pair.is_consistent())
        .map(EntryPair::planned_repair)
        .collect())
}

/// Repair every entry whose two copies disagree and return the repairs made.
pub fn repair_cart(
    customer_id: CustomerId,
    connection: &Connection,
) -> Result<Vec<CartRepair>, Error> {
    let transaction = begin_immediate(connection)?;
    let mut cart = get_embedded_cart(customer_id, &transaction)?;
    let records = get_cart_records(customer_id, &transaction)?;

    let repairs = pair_entries(&cart, records)
        .iter()
        .filter(|pair| !pair.is_consistent())
        .map(|pair| reconcile(customer_id, pair, &mut cart, &transaction))
        .collect::<Result<Vec<_>, _>>()?;

    transaction.commit()?;

    Ok(repairs)
}

fn adjust_quantity(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    connection: &Connection,
    adjust: impl FnOnce(Quantity) -> Result<Option<Quantity>, Error>,
) -> Result<CartEntry, Error> {
    let transaction = begin_immediate(connection)?;
    let mut cart = get_embedded_cart(customer_id, &transaction)?;
    let pair = load_pair(customer_id, entry_id, &cart, &transaction)?
        .ok_or(Error::EntryNotFound(entry_id))?;

    if !pair.is_consistent() {
        let repair = reconcile(customer_id, &pair, &mut cart, &transaction)?;
        transaction.commit()?;
        return Err(Error::EntryInconsistent(repair));
    }

    let entry = {
        let entry = entry_mut(&mut cart, entry_id)?;
        match adjust(entry.quantity)? {
            Some(quantity) => entry.quantity = quantity,
            None => return Ok(entry.clone()),
        }
        entry.clone()
    };

    set_embedded_cart(customer_id, &cart, &transaction)?;
    set_cart_record_quantity(entry_id, entry.quantity, &transaction)?;
    transaction.commit()?;

    Ok(entry)
}

fn load_pair(
    customer_id: CustomerId,
    entry_id: CartEntryId,
    cart: &[CartEntry],
    connection: &Connection,
) -> Result<Option<EntryPair>, Error> {
    let embedded = cart.iter().find(|entry| entry.id == entry_id).cloned();
    let standalone = get_cart_record(customer_id, entry_id, connection)?;

    Ok(EntryPair::new(embedded, standalone))
}

/// Match embedded entries with standalone records by ID, in ID order.
fn pair_entries(cart: &[CartEntry], records: Vec<CartEntry>) -> Vec<EntryPair> {
    let mut copies: BTreeMap<CartEntryId, (Option<CartEntry>, Option<CartEntry>)> =
        BTreeMap::new();

    for entry in cart {
        copies.entry(entry.id).or_default().0 = Some(entry.clone());
    }

    for record in records {
        let id = record.id;
        copies.entry(id).or_default().1 = Some(record);
    }

    copies
        .into_values()
        .filter_map(|(embedded, standalone)| EntryPair::new(embedded, standalone))
        .collect()
}

/// Bring both copies of `pair` to the higher quantity, writing the embedded
/// cart and then the standalone record.
///
/// `cart` is updated in place so callers can keep working with it.
fn reconcile(
    customer_id: CustomerId,
    pair: &EntryPair,
    cart: &mut Vec<CartEntry>,
    connection: &Connection,
) -> Result<CartRepair, Error> {
    let repair = pair.planned_repair();
    let quantity = pair.repaired_quantity();

    let mut survivor = pair.entry().clone();
    survivor.quantity = quantity;

    match cart.iter_mut().find(|entry| entry.id == survivor.id) {
        Some(entry) => entry.quantity = quantity,
        None => {
            let index = cart.partition_point(|entry| entry.id < survivor.id);
            cart.insert(index, survivor.clone());
        }
    }
    set_embedded_cart(customer_id, cart, connection)?;

    if pair.has_standalone() {
        set_cart_record_quantity(survivor.id, quantity, connection)?;
    } else {
        insert_cart_record(&survivor, connection)?;
    }

    tracing::warn!(
        "repaired cart entry {} of customer {customer_id} to quantity {quantity} \
         (embedded {:?}, standalone {:?})",
        survivor.id,
        repair.embedded,
        repair.standalone,
    );

    Ok(repair)
}

fn entry_mut(cart: &mut [CartEntry], entry_id: CartEntryId) -> Result<&mut CartEntry, Error> {
    cart.iter_mut()
        .find(|entry| entry.id == entry_id)
        .ok_or(Error::EntryNotFound(entry_id))
}

#[cfg(test)]
mod cart_sync_tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
    };

    use rusqlite::Connection;

    use crate::{
        Error,
        cart::{
            CartEntry, CartRepair, Quantity, Resolution,
            db::{delete_cart_record, get_cart_records, set_cart_record_quantity},
        },
        catalog::{ItemSnapshot, test_utils::create_test_item},
        customer::{set_embedded_cart, test_utils::create_test_customer},
        database_id::CustomerId,
        db::{Database, initialize, test_utils::TempDatabaseFile},
        idempotency::RequestKey,
    };

    use super::{
        add_or_merge, audit_cart, decrement, drain_for_order, get_cart, get_cart_entry, increment,
        remove, repair_cart,
    };

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

    fn add(fixture: &Fixture, item: &ItemSnapshot, quantity: i64) -> CartEntry {
        add_or_merge(
            fixture.customer_id,
            item.clone(),
            quantity,
            None,
            &fixture.connection,
        )
        .expect("Could not add to cart")
        .entry
    }

    fn quantity(count: i64) -> Quantity {
        Quantity::new_unchecked(count)
    }

    #[track_caller]
    fn assert_consistent(fixture: &Fixture, want: &[CartEntry]) {
        assert_eq!(
            get_cart(fixture.customer_id, &fixture.connection).as_deref(),
            Ok(want)
        );
        assert_eq!(
            get_cart_records(fixture.customer_id, &fixture.connection).as_deref(),
            Ok(want)
        );
    }

    #[test]
    fn add_new_item_writes_both_copies() {
        let fixture = setup();

        let added = add_or_merge(
            fixture.customer_id,
            fixture.tea.clone(),
            2,
            None,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(added.repair, None);
        assert_eq!(added.entry.quantity, quantity(2));
        assert_eq!(added.entry.item, fixture.tea);
        assert_consistent(&fixture, std::slice::from_ref(&added.entry));
        assert_eq!(
            get_cart_entry(fixture.customer_id, added.entry.id, &fixture.connection),
            Ok(added.entry)
        );
    }

    #[test]
    fn add_same_item_merges_into_one_entry() {
        let fixture = setup();
        let first = add(&fixture, &fixture.tea, 1);

        let merged = add(&fixture, &fixture.tea, 2);

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.quantity, quantity(3));
        assert_consistent(&fixture, &[merged]);
    }

    #[test]
    fn entries_keep_the_order_they_were_added_in() {
        let fixture = setup();
        let tea = add(&fixture, &fixture.tea, 1);
        let cake = add(&fixture, &fixture.cake, 1);
        let tea = add(&fixture, &tea.item, 1);

        assert_consistent(&fixture, &[tea, cake]);
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let fixture = setup();

        let result = add_or_merge(
            fixture.customer_id,
            fixture.tea.clone(),
            0,
            None,
            &fixture.connection,
        );

        assert_eq!(result, Err(Error::InvalidQuantity(0)));
        assert_consistent(&fixture, &[]);
    }

    #[test]
    fn add_for_missing_customer_returns_not_found() {
        let fixture = setup();

        let result = add_or_merge(999, fixture.tea.clone(), 1, None, &fixture.connection);

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(get_cart_records(999, &fixture.connection), Ok(vec![]));
    }

    #[test]
    fn add_with_used_request_key_replays_first_result() {
        let fixture = setup();
        let key = RequestKey::new("retry-me").unwrap();

        let first = add_or_merge(
            fixture.customer_id,
            fixture.tea.clone(),
            2,
            Some(&key),
            &fixture.connection,
        )
        .unwrap();
        let retry = add_or_merge(
            fixture.customer_id,
            fixture.tea.clone(),
            2,
            Some(&key),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(retry, first);
        assert_consistent(&fixture, &[first.entry]);
    }

    #[test]
    fn add_repairs_inconsistent_entry_before_merging() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 2);
        set_cart_record_quantity(entry.id, quantity(5), &fixture.connection).unwrap();

        let added = add_or_merge(
            fixture.customer_id,
            fixture.tea.clone(),
            1,
            None,
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            added.repair,
            Some(CartRepair {
                entry_id: entry.id,
                item_name: "Tea".to_owned(),
                embedded: Some(quantity(2)),
                standalone: Some(quantity(5)),
                resolution: Resolution::Restored {
                    quantity: quantity(5)
                },
            })
        );
        assert_eq!(added.entry.quantity, quantity(6));
        assert_consistent(&fixture, &[added.entry]);
    }

    #[test]
    fn increment_then_decrement() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 1);

        let incremented = increment(fixture.customer_id, entry.id, &fixture.connection).unwrap();
        assert_eq!(incremented.quantity, quantity(2));
        assert_consistent(&fixture, std::slice::from_ref(&incremented));

        let decremented = decrement(fixture.customer_id, entry.id, &fixture.connection).unwrap();
        assert_eq!(decremented.quantity, quantity(1));
        assert_consistent(&fixture, &[decremented]);
    }

    #[test]
    fn decrement_at_one_leaves_entry_unchanged() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 1);

        let result = decrement(fixture.customer_id, entry.id, &fixture.connection);

        assert_eq!(result, Ok(entry.clone()));
        assert_consistent(&fixture, &[entry]);
    }

    #[test]
    fn adjusting_missing_entry_returns_entry_not_found() {
        let fixture = setup();

        assert_eq!(
            increment(fixture.customer_id, 42, &fixture.connection),
            Err(Error::EntryNotFound(42))
        );
        assert_eq!(
            decrement(fixture.customer_id, 42, &fixture.connection),
            Err(Error::EntryNotFound(42))
        );
    }

    #[test]
    fn increment_on_mismatched_quantities_repairs_without_incrementing() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 2);
        set_cart_record_quantity(entry.id, quantity(4), &fixture.connection).unwrap();

        let result = increment(fixture.customer_id, entry.id, &fixture.connection);

        assert_eq!(
            result,
            Err(Error::EntryInconsistent(CartRepair {
                entry_id: entry.id,
                item_name: "Tea".to_owned(),
                embedded: Some(quantity(2)),
                standalone: Some(quantity(4)),
                resolution: Resolution::Restored {
                    quantity: quantity(4)
                },
            }))
        );
        let repaired = CartEntry {
            quantity: quantity(4),
            ..entry.clone()
        };
        assert_consistent(&fixture, &[repaired]);

        let retried = increment(fixture.customer_id, entry.id, &fixture.connection).unwrap();
        assert_eq!(retried.quantity, quantity(5));
    }

    #[test]
    fn increment_restores_missing_standalone_record() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 2);
        delete_cart_record(entry.id, &fixture.connection).unwrap();

        let result = increment(fixture.customer_id, entry.id, &fixture.connection);

        assert!(matches!(
            result,
            Err(Error::EntryInconsistent(CartRepair {
                embedded: Some(_),
                standalone: None,
                ..
            }))
        ));
        assert_consistent(&fixture, &[entry]);
    }

    #[test]
    fn decrement_restores_missing_embedded_entry_in_place() {
        let fixture = setup();
        let tea = add(&fixture, &fixture.tea, 3);
        let cake = add(&fixture, &fixture.cake, 1);
        set_embedded_cart(fixture.customer_id, &[cake.clone()], &fixture.connection).unwrap();

        let result = decrement(fixture.customer_id, tea.id, &fixture.connection);

        assert!(matches!(
            result,
            Err(Error::EntryInconsistent(CartRepair {
                embedded: None,
                standalone: Some(_),
                ..
            }))
        ));
        assert_consistent(&fixture, &[tea, cake]);
    }

    #[test]
    fn remove_deletes_both_copies() {
        let fixture = setup();
        let tea = add(&fixture, &fixture.tea, 1);
        let cake = add(&fixture, &fixture.cake, 1);

        let removed = remove(fixture.customer_id, tea.id, &fixture.connection);

        assert_eq!(removed, Ok(tea.clone()));
        assert_consistent(&fixture, &[cake]);
        assert_eq!(
            get_cart_entry(fixture.customer_id, tea.id, &fixture.connection),
            Err(Error::EntryNotFound(tea.id))
        );
    }

    #[test]
    fn remove_with_mismatched_quantities_succeeds() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 1);
        set_cart_record_quantity(entry.id, quantity(9), &fixture.connection).unwrap();

        let removed = remove(fixture.customer_id, entry.id, &fixture.connection);

        assert_eq!(removed, Ok(entry));
        assert_consistent(&fixture, &[]);
    }

    #[test]
    fn remove_with_one_copy_reports_inconsistency() {
        let fixture = setup();
        let entry = add(&fixture, &fixture.tea, 2);
        set_embedded_cart(fixture.customer_id, &[], &fixture.connection).unwrap();

        let result = remove(fixture.customer_id, entry.id, &fixture.connection);

        assert_eq!(
            result,
            Err(Error::EntryInconsistent(CartRepair {
                entry_id: entry.id,
                item_name: "Tea".to_owned(),
                embedded: None,
                standalone: Some(quantity(2)),
                resolution: Resolution::Removed,
            }))
        );
        assert_consistent(&fixture, &[]);
    }

    #[test]
    fn remove_missing_entry_returns_entry_not_found() {
        let fixture = setup();

        let result = remove(fixture.customer_id, 7, &fixture.connection);

        assert_eq!(result, Err(Error::EntryNotFound(7)));
    }

    #[test]
    fn drain_returns_entries_and_empties_both_copies() {
        let fixture = setup();
        let tea = add(&fixture, &fixture.tea, 2);
        let cake = add(&fixture, &fixture.cake, 1);

        let drained = drain_for_order(fixture.customer_id, &fixture.connection);

        assert_eq!(drained, Ok(vec![tea, cake]));
        assert_consistent(&fixture, &[]);
    }

    #[test]
    fn drain_of_inconsistent_cart_repairs_and_removes_nothing() {
        let fixture = setup();
        let tea = add(&fixture, &fixture.tea, 2);
        let cake = add(&fixture, &fixture.cake, 1);
        delete_cart_record(cake.id, &fixture.connection).unwrap();

        let result = drain_for_order(fixture.customer_id, &fixture.connection);

        let Err(Error::DrainFailed(repairs)) = result else {
            panic!("expected DrainFailed, got {result:?}");
        };
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].entry_id, cake.id);
        assert_consistent(&fixture, &[tea.clone(), cake.clone()]);

        let retried = drain_for_order(fixture.customer_id, &fixture.connection);
        assert_eq!(retried, Ok(vec![tea, cake]));
    }

    #[test]
    fn drain_of_empty_cart_returns_no_entries() {
        let fixture = setup();

        assert_eq!(
            drain_for_order(fixture.customer_id, &fixture.connection),
            Ok(vec![])
        );
    }

    #[test]
    fn audit_reports_without_changing_and_repair_fixes() {
        let fixture = setup();
        let tea = add(&fixture, &fixture.tea, 2);
        let cake = add(&fixture, &fixture.cake, 3);
        set_cart_record_quantity(tea.id, quantity(1), &fixture.connection).unwrap();
        set_embedded_cart(fixture.customer_id, &[tea.clone()], &fixture.connection).unwrap();

        let audit = audit_cart(fixture.customer_id, &fixture.connection).unwrap();

        assert_eq!(audit.len(), 2);
        assert_eq!(
            audit[0].resolution,
            Resolution::Restored {
                quantity: quantity(2)
            }
        );
        assert_eq!(audit[1].embedded, None);
        assert_eq!(
            get_cart(fixture.customer_id, &fixture.connection),
            Ok(vec![tea.clone()])
        );

        let repairs = repair_cart(fixture.customer_id, &fixture.connection).unwrap();

        assert_eq!(repairs, audit);
        assert_consistent(&fixture, &[tea, cake]);
        assert_eq!(audit_cart(fixture.customer_id, &fixture.connection), Ok(vec![]));
    }

    #[test]
    fn operations_do_not_touch_other_customers() {
        let fixture = setup();
        let bob = create_test_customer("bob", &fixture.connection).id;
        let adas_entry = add(&fixture, &fixture.tea, 1);

        let result = increment(bob, adas_entry.id, &fixture.connection);

        assert_eq!(result, Err(Error::EntryNotFound(adas_entry.id)));
        assert_consistent(&fixture, &[adas_entry]);
    }

    #[test]
    fn concurrent_adds_of_same_item_all_land() {
        let database = Arc::new(Database::open_in_memory().unwrap());
        let (customer_id, tea) = {
            let connection = database.lock().unwrap();
            (
                create_test_customer("ada", &connection).id,
                create_test_item("Tea", None, &connection).snapshot(),
            )
        };

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let database = Arc::clone(&database);
                let tea = tea.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let connection = database.lock().unwrap();
                        add_or_merge(customer_id, tea.clone(), 1, None, &connection).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let connection = database.lock().unwrap();
        let cart = get_cart(customer_id, &connection).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, quantity(80));
        assert_eq!(get_cart_records(customer_id, &connection), Ok(cart));
    }

    /// Run `operation` `rounds` times on each of `workers` threads, each thread
    /// with its own connection to `file`, all starting together.
    fn race_on_separate_connections(
        file: &Arc<TempDatabaseFile>,
        workers: usize,
        rounds: usize,
        operation: impl Fn(&Connection) + Send + Sync + 'static,
    ) {
        let operation = Arc::new(operation);
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let file = Arc::clone(file);
                let operation = Arc::clone(&operation);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let connection = file.open();
                    barrier.wait();
                    for _ in 0..rounds {
                        operation(&connection);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn concurrent_adds_through_separate_connections_merge_into_one_entry() {
        let file = Arc::new(TempDatabaseFile::new("cart-add-race"));
        let (customer_id, tea) = {
            let connection = file.open();
            (
                create_test_customer("ada", &connection).id,
                create_test_item("Tea", None, &connection).snapshot(),
            )
        };

        race_on_separate_connections(&file, 6, 10, move |connection| {
            add_or_merge(customer_id, tea.clone(), 1, None, connection).unwrap();
        });

        let connection = file.open();
        let cart = get_cart(customer_id, &connection).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, quantity(60));
        assert_eq!(get_cart_records(customer_id, &connection), Ok(cart));
    }

    #[test]
    fn concurrent_increments_through_separate_connections_are_not_lost() {
        let file = Arc::new(TempDatabaseFile::new("cart-increment-race"));
        let (customer_id, entry_id) = {
            let connection = file.open();
            let customer_id = create_test_customer("ada", &connection).id;
            let tea = create_test_item("Tea", None, &connection).snapshot();
            let added = add_or_merge(customer_id, tea, 1, None, &connection).unwrap();
            (customer_id, added.entry.id)
        };

        race_on_separate_connections(&file, 6, 10, move |connection| {
            increment(customer_id, entry_id, connection).unwrap();
        });

        let connection = file.open();
        let cart = get_cart(customer_id, &connection).unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].id, entry_id);
        assert_eq!(cart[0].quantity, quantity(61));
        assert_eq!(get_cart_records(customer_id, &connection), Ok(cart));
    }
}
