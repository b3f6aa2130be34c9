//! Pricing engine for the Receptivo back office.
//!
//! Classifies child ages, prices booking lines, aggregates orders and renders
//! them as itinerary or messenger text. Called by Django over HTTP/JSON.

pub mod calculators;
pub mod classifier;
pub mod clock;
pub mod error;
pub mod events;
pub mod models;
pub mod order_number;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod roster;
pub mod routes;
pub mod services;
pub mod store;
pub mod validation;

// Re-export commonly used items
pub use calculators::{format_brl, price_line_item, round_money};
pub use classifier::classify_ages;
pub use error::{ErrorKind, PricingError, ValidationError};
pub use events::{PricingEvent, Recorded};
pub use routes::router;
pub use services::OrderService;
pub use store::{InMemoryStore, OrderStore};
