pub mod analytics;
pub mod auth;
pub mod invoices;
pub mod messages;
pub mod orders;
pub mod products;
pub mod upload;
pub mod users;
