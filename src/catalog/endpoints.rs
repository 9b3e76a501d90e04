//! JSON endpoints for browsing the catalog and for staff to manage it.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    Error,
    catalog::{
        BatchReport, Category, CategoryChange, CategoryName, Item, ItemDetails, Price,
        StaleMembership, create_category, create_item, delete_categories, delete_items,
        find_stale_memberships, get_all_categories, get_all_items, get_category_by_name,
        get_item, get_items_in_category, rename_category, update_item,
    },
    database_id::{CategoryId, ItemId},
    db::Database,
    identity::StaffMember,
};

/// The request body for creating or editing an item.
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    /// The item's unique name.
    pub name: String,
    /// A short description of the item.
    #[serde(default)]
    pub description: String,
    /// The unit price, must not be negative.
    pub price: f64,
    /// A URL or path to a picture of the item.
    #[serde(default)]
    pub image: String,
    /// A category to add the item to, in addition to "All".
    #[serde(default)]
    pub category: Option<String>,
}

impl TryFrom<ItemRequest> for ItemDetails {
    type Error = Error;

    fn try_from(request: ItemRequest) -> Result<Self, Self::Error> {
        let category = request
            .category
            .as_deref()
            .map(CategoryName::new)
            .transpose()?;

        Ok(ItemDetails {
            name: request.name,
            description: request.description,
            price: Price::new(request.price)?,
            image: request.image,
            category,
        })
    }
}

/// The request body for creating or renaming a category.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    /// The category's name.
    pub name: String,
    /// The names of items to add to the category.
    #[serde(default)]
    pub items: Vec<String>,
}

/// The request body for deleting items or categories by name.
#[derive(Debug, Deserialize)]
pub struct DeleteByNameRequest {
    /// The names to delete.
    pub names: Vec<String>,
}

/// List every item in the catalog.
pub async fn get_items_endpoint(
    State(database): State<Database>,
) -> Result<Json<Vec<Item>>, Error> {
    database.run(get_all_items).await.map(Json)
}

/// Get one item by ID.
pub async fn get_item_endpoint(
    State(database): State<Database>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<Item>, Error> {
    database
        .run(move |connection| get_item(item_id, connection))
        .await
        .map(Json)
}

/// List the items in one category.
pub async fn get_menu_endpoint(
    State(database): State<Database>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Item>>, Error> {
    database
        .run(move |connection| {
            let category = get_category_by_name(&category, connection)?;

            get_items_in_category(category.name.as_ref(), connection)
        })
        .await
        .map(Json)
}

/// List every category, including "All".
pub async fn get_categories_endpoint(
    State(database): State<Database>,
) -> Result<Json<Vec<Category>>, Error> {
    database.run(get_all_categories).await.map(Json)
}

/// Add an item to the catalog.
pub async fn create_item_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
    Json(request): Json<ItemRequest>,
) -> Result<(StatusCode, Json<Item>), Error> {
    let details = ItemDetails::try_from(request)?;
    let item = database
        .run(move |connection| create_item(details, connection))
        .await?;
    tracing::info!("created item {} ({})", item.id, item.name);

    Ok((StatusCode::CREATED, Json(item)))
}

/// Edit an item's display fields.
pub async fn update_item_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
    Path(item_id): Path<ItemId>,
    Json(request): Json<ItemRequest>,
) -> Result<Json<Item>, Error> {
    let details = ItemDetails::try_from(request)?;
    database
        .run(move |connection| update_item(item_id, details, connection))
        .await
        .map(Json)
}

/// Delete items by name, reporting the result for each name.
pub async fn delete_items_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
    Json(request): Json<DeleteByNameRequest>,
) -> Result<Json<BatchReport>, Error> {
    database
        .run(move |connection| Ok(delete_items(&request.names, connection)))
        .await
        .map(Json)
}

/// Create a category and add the selected items to it.
pub async fn create_category_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
    Json(request): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryChange>), Error> {
    let name = CategoryName::new(&request.name)?;
    let change = database
        .run(move |connection| create_category(name, &request.items, connection))
        .await?;

    Ok((StatusCode::CREATED, Json(change)))
}

/// Rename a category and add the selected items to it.
pub async fn rename_category_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
    Path(category_id): Path<CategoryId>,
    Json(request): Json<CategoryRequest>,
) -> Result<Json<CategoryChange>, Error> {
    let name = CategoryName::new(&request.name)?;
    database
        .run(move |connection| rename_category(category_id, name, &request.items, connection))
        .await
        .map(Json)
}

/// Delete categories by name, reporting the result for each name.
pub async fn delete_categories_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
    Json(request): Json<DeleteByNameRequest>,
) -> Result<Json<BatchReport>, Error> {
    database
        .run(move |connection| Ok(delete_categories(&request.names, connection)))
        .await
        .map(Json)
}

/// List the items that reference categories that no longer exist.
pub async fn get_stale_memberships_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
) -> Result<Json<Vec<StaleMembership>>, Error> {
    database.run(find_stale_memberships).await.map(Json)
}
