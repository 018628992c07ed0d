pub mod adjustments;
pub mod database;
pub mod gateway;
pub mod metrics;
pub mod payments;
pub mod statements;
pub mod tariffs;

pub use adjustments::AdjustmentWorkflow;
pub use database::Database;
pub use gateway::{BillingGateway, BillingTransaction, POSTING_REJECTED};
pub use payments::PaymentWorkflow;
pub use statements::StatementService;
