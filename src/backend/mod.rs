pub mod auth;
pub mod client;
pub mod error;
pub mod reporter;
pub mod types;

pub use auth::{FileTokenStore, StaticTokenStore, TokenStore};
pub use client::BackendClient;
pub use error::ApiError;
pub use reporter::PositionReporter;
