pub mod client;
pub mod error_body;
pub mod listing;
pub mod operations;
pub mod provider;
