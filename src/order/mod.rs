//! Orders: placing them singly or from a cart, and their approval lifecycle.

mod checkout;
mod db;
mod domain;
mod endpoints;
mod lifecycle;

pub use checkout::{
    OrderStore, SQLiteOrderStore, SharedOrderStore, place_from_cart, resume_checkout,
};
pub use db::{create_order_tables, get_order, get_pending_checkout};
pub use domain::{CheckoutOutcome, CheckoutResult, NewOrder, Order, OrderStatus};
pub use endpoints::{
    PlaceOrderRequest, approve_order_endpoint, checkout_endpoint, get_all_orders_endpoint,
    get_my_orders_endpoint, place_order_endpoint, reject_order_endpoint,
    resume_checkout_endpoint,
};
pub use lifecycle::{list_all, list_for_customer, place_single, transition};
