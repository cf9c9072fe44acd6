pub mod executor;
pub mod retry;
pub mod types;
