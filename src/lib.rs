pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod estimator;
pub mod geo;
pub mod models;
pub mod observability;
pub mod state;
pub mod tracking;
