pub mod aggregate;
pub mod month;
pub mod notify;
pub mod order;
pub mod outcome;

pub use aggregate::*;
pub use month::*;
pub use notify::*;
pub use order::*;
pub use outcome::*;

/// Default number of orders within one month that makes a customer "loyal"
pub const DEFAULT_LOYALTY_THRESHOLD: u64 = 5;
