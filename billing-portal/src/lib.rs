//! billing-portal: web front end for electricity bill payment, retrieval
//! and adjustment over a PostgreSQL billing schema.
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;
