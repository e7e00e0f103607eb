pub mod health;
pub mod payment;

pub use health::*;
pub use payment::*;
