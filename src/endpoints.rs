//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/items/{item_id}', use [format_endpoint].

/// The route to register customers and for staff to list them.
pub const CUSTOMERS: &str = "/api/customers";
/// The route for the customer making the request, including their cart.
pub const CURRENT_CUSTOMER: &str = "/api/customer";

/// The route to list and create catalog items.
pub const ITEMS: &str = "/api/items";
/// The route to get or edit a single item.
pub const ITEM: &str = "/api/items/{item_id}";
/// The route to delete items by name.
pub const DELETE_ITEMS: &str = "/api/items/delete";
/// The route to list the items in a category.
pub const MENU: &str = "/api/menu/{category}";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to rename a category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to delete categories by name.
pub const DELETE_CATEGORIES: &str = "/api/categories/delete";
/// The route to list items that reference missing categories.
pub const STALE_MEMBERSHIPS: &str = "/api/categories/stale";

/// The route to list and add to the current customer's cart.
pub const CART: &str = "/api/cart";
/// The route to get or remove a single cart entry.
pub const CART_ENTRY: &str = "/api/cart/{entry_id}";
/// The route to add one to a cart entry's quantity.
pub const INCREMENT_CART_ENTRY: &str = "/api/cart/{entry_id}/increment";
/// The route to subtract one from a cart entry's quantity.
pub const DECREMENT_CART_ENTRY: &str = "/api/cart/{entry_id}/decrement";
/// The route to list disagreements between the two copies of the cart.
pub const CART_AUDIT: &str = "/api/cart/audit";
/// The route to repair every disagreement in the cart.
pub const CART_REPAIR: &str = "/api/cart/repair";

/// The route to list the current customer's orders and to order a single item.
pub const ORDERS: &str = "/api/orders";
/// The route to turn the cart into orders.
pub const CHECKOUT: &str = "/api/orders/checkout";
/// The route to finish an interrupted checkout.
pub const RESUME_CHECKOUT: &str = "/api/orders/resume";
/// The route for staff to list every order.
pub const ALL_ORDERS: &str = "/api/orders/all";
/// The route for staff to approve an order.
pub const APPROVE_ORDER: &str = "/api/orders/{order_id}/approve";
/// The route for staff to reject an order.
pub const REJECT_ORDER: &str = "/api/orders/{order_id}/reject";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/items/{item_id}', '{item_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::CUSTOMERS,
            endpoints::CURRENT_CUSTOMER,
            endpoints::ITEMS,
            endpoints::DELETE_ITEMS,
            endpoints::CATEGORIES,
            endpoints::DELETE_CATEGORIES,
            endpoints::STALE_MEMBERSHIPS,
            endpoints::CART,
            endpoints::CART_AUDIT,
            endpoints::CART_REPAIR,
            endpoints::ORDERS,
            endpoints::CHECKOUT,
            endpoints::RESUME_CHECKOUT,
            endpoints::ALL_ORDERS,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }

        for endpoint in [
            endpoints::ITEM,
            endpoints::MENU,
            endpoints::CATEGORY,
            endpoints::CART_ENTRY,
            endpoints::INCREMENT_CART_ENTRY,
            endpoints::DECREMENT_CART_ENTRY,
            endpoints::APPROVE_ORDER,
            endpoints::REJECT_ORDER,
        ] {
            assert_endpoint_is_valid_uri(&format_endpoint(endpoint, 1));
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint(endpoints::APPROVE_ORDER, 7);

        assert_eq!(formatted_path, "/api/orders/7/approve");
    }
}
