pub mod adjustment;
pub mod health;
pub mod metrics;
pub mod pages;
pub mod payment;
pub mod retrieval;
