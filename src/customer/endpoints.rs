//! Endpoints for registering customers, reading the current customer and
//! listing every customer for staff.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    Error,
    customer::{Customer, NewCustomer, create_customer, get_all_customers, get_customer},
    db::Database,
    identity::{CurrentCustomer, StaffMember},
};

/// Register a new customer with an empty cart.
pub async fn register_customer_endpoint(
    State(database): State<Database>,
    Json(new_customer): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), Error> {
    let customer = database
        .run(move |connection| create_customer(new_customer, connection))
        .await?;

    tracing::info!("registered customer {} ({})", customer.id, customer.username);

    Ok((StatusCode::CREATED, Json(customer)))
}

/// Get the current customer, including their embedded cart.
pub async fn get_current_customer_endpoint(
    State(database): State<Database>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<Customer>, Error> {
    database
        .run(move |connection| get_customer(customer_id, connection))
        .await
        .map(Json)
}

/// List every customer, ordered by username.
pub async fn get_customers_endpoint(
    State(database): State<Database>,
    StaffMember(_): StaffMember,
) -> Result<Json<Vec<Customer>>, Error> {
    database.run(get_all_customers).await.map(Json)
}
