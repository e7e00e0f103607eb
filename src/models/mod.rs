pub mod explorer;
pub mod report;
pub mod response;

pub use explorer::*;
pub use report::*;
pub use response::*;
