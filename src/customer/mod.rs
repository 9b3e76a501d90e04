//! Customers and the cart embedded in each customer's record.

mod db;
mod endpoints;

pub use db::{
    Customer, NewCustomer, create_customer, create_customer_table, customer_exists,
    get_all_customers, get_customer,
};
pub(crate) use db::{get_embedded_cart, set_embedded_cart};
#[cfg(test)]
pub(crate) use db::test_utils;
pub use endpoints::{
    get_current_customer_endpoint, get_customers_endpoint, register_customer_endpoint,
};
