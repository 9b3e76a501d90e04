use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;

use canteen_rs::{
    catalog::{CategoryName, ItemDetails, Price, create_category, create_item},
    customer::{NewCustomer, create_customer},
    initialize_db,
};

/// A utility for creating a test database for the REST API server of canteen_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// The demo catalog: name, description, price and whether it is a drink.
const DEMO_ITEMS: [(&str, &str, f64, bool); 5] = [
    ("Tea", "A pot of black tea", 3.5, true),
    ("Flat White", "Double shot with steamed milk", 5.0, true),
    ("Lemonade", "Freshly squeezed", 4.0, true),
    ("Cheese Scone", "Served warm with butter", 4.5, false),
    ("Carrot Cake", "With cream cheese icing", 6.0, false),
];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating demo catalog...");

    for (name, description, price, _) in DEMO_ITEMS {
        create_item(
            ItemDetails {
                name: name.to_owned(),
                description: description.to_owned(),
                price: Price::new(price)?,
                image: format!("/images/{}.png", name.to_lowercase().replace(' ', "_")),
                category: None,
            },
            &conn,
        )?;
    }

    let drinks: Vec<String> = DEMO_ITEMS
        .iter()
        .filter(|(_, _, _, is_drink)| *is_drink)
        .map(|(name, ..)| name.to_string())
        .collect();
    create_category(CategoryName::new("Drinks")?, &drinks, &conn)?;

    println!("Creating test customer...");

    let customer = create_customer(
        NewCustomer {
            username: "test".to_owned(),
            first_name: "Test".to_owned(),
            last_name: "Customer".to_owned(),
        },
        &conn,
    )?;

    println!(
        "Success! Send requests as the test customer with 'x-customer-id: {}'",
        customer.id
    );

    Ok(())
}
