//! The item catalog and the categories items are grouped under.

mod db;
mod domain;
mod endpoints;
mod membership;

pub use db::{
    create_catalog_tables, create_item, delete_item_by_name, get_all_categories, get_all_items,
    get_category, get_category_by_name, get_item, get_item_by_name, get_items_in_category,
    update_item,
};
pub(crate) use db::map_snapshot_columns;
#[cfg(test)]
pub(crate) use db::test_utils;
pub use domain::{
    ALL_CATEGORY, BatchOutcome, BatchReport, Category, CategoryChange, CategoryName, Item,
    ItemDetails, ItemSnapshot, Memberships, Price, StaleMembership,
};
pub use endpoints::{
    CategoryRequest, DeleteByNameRequest, ItemRequest, create_category_endpoint,
    create_item_endpoint, delete_categories_endpoint, delete_items_endpoint,
    get_categories_endpoint, get_item_endpoint, get_items_endpoint, get_menu_endpoint,
    get_stale_memberships_endpoint, rename_category_endpoint, update_item_endpoint,
};
pub use membership::{
    assign_items, create_category, delete_categories, delete_items, find_stale_memberships,
    rename_category,
};
