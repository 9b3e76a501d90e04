//! Customer carts, stored twice and kept in agreement.
//!
//! Each entry lives in the customer's record (the embedded cart, used to
//! list the cart) and as a standalone record (used to look an entry up by
//! ID). [sync] owns every write to either copy.

mod db;
mod domain;
mod endpoints;
pub mod sync;

pub use db::create_cart_entry_table;
pub use domain::{AddedToCart, CartEntry, CartRepair, Quantity, Resolution};
pub use endpoints::{
    AddToCartRequest, add_to_cart_endpoint, audit_cart_endpoint, decrement_endpoint,
    get_cart_endpoint, get_cart_entry_endpoint, increment_endpoint, remove_endpoint,
    repair_cart_endpoint,
};
pub(crate) use sync::{Drain, drain_within};
pub use sync::{
    add_or_merge, audit_cart, decrement, drain_for_order, get_cart, get_cart_entry, increment,
    remove, repair_cart,
};
