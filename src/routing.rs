//! Application router configuration for the customer, catalog, cart and order routes.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState, Error,
    cart::{
        add_to_cart_endpoint, audit_cart_endpoint, decrement_endpoint, get_cart_endpoint,
        get_cart_entry_endpoint, increment_endpoint, remove_endpoint, repair_cart_endpoint,
    },
    catalog::{
        create_category_endpoint, create_item_endpoint, delete_categories_endpoint,
        delete_items_endpoint, get_categories_endpoint, get_item_endpoint, get_items_endpoint,
        get_menu_endpoint, get_stale_memberships_endpoint, rename_category_endpoint,
        update_item_endpoint,
    },
    customer::{
        get_current_customer_endpoint, get_customers_endpoint, register_customer_endpoint,
    },
    endpoints,
    logging::logging_middleware,
    order::{
        approve_order_endpoint, checkout_endpoint, get_all_orders_endpoint,
        get_my_orders_endpoint, place_order_endpoint, reject_order_endpoint,
        resume_checkout_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Customer routes identify the customer with the `x-customer-id` header and
/// staff routes require the `x-staff-role` header, see [crate::identity].
pub fn build_router(state: AppState) -> Router {
    let customer_routes = Router::new()
        .route(
            endpoints::CUSTOMERS,
            get(get_customers_endpoint).post(register_customer_endpoint),
        )
        .route(
            endpoints::CURRENT_CUSTOMER,
            get(get_current_customer_endpoint),
        );

    let catalog_routes = Router::new()
        .route(
            endpoints::ITEMS,
            get(get_items_endpoint).post(create_item_endpoint),
        )
        .route(
            endpoints::ITEM,
            get(get_item_endpoint).put(update_item_endpoint),
        )
        .route(endpoints::DELETE_ITEMS, post(delete_items_endpoint))
        .route(endpoints::MENU, get(get_menu_endpoint))
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(endpoints::CATEGORY, put(rename_category_endpoint))
        .route(
            endpoints::DELETE_CATEGORIES,
            post(delete_categories_endpoint),
        )
        .route(
            endpoints::STALE_MEMBERSHIPS,
            get(get_stale_memberships_endpoint),
        );

    let cart_routes = Router::new()
        .route(
            endpoints::CART,
            get(get_cart_endpoint).post(add_to_cart_endpoint),
        )
        .route(
            endpoints::CART_ENTRY,
            get(get_cart_entry_endpoint).delete(remove_endpoint),
        )
        .route(endpoints::INCREMENT_CART_ENTRY, post(increment_endpoint))
        .route(endpoints::DECREMENT_CART_ENTRY, post(decrement_endpoint))
        .route(endpoints::CART_AUDIT, get(audit_cart_endpoint))
        .route(endpoints::CART_REPAIR, post(repair_cart_endpoint));

    let order_routes = Router::new()
        .route(
            endpoints::ORDERS,
            get(get_my_orders_endpoint).post(place_order_endpoint),
        )
        .route(endpoints::CHECKOUT, post(checkout_endpoint))
        .route(endpoints::RESUME_CHECKOUT, post(resume_checkout_endpoint))
        .route(endpoints::ALL_ORDERS, get(get_all_orders_endpoint))
        .route(endpoints::APPROVE_ORDER, post(approve_order_endpoint))
        .route(endpoints::REJECT_ORDER, post(reject_order_endpoint));

    customer_routes
        .merge(catalog_routes)
        .merge(cart_routes)
        .merge(order_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
