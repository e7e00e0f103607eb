pub mod checker;
pub mod explorer;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{PaymentChecker, PaymentRequest};
pub use explorer::{BscScanClient, ExplorerError, ExplorerProvider};
