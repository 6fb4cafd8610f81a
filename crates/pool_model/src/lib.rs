//! Pure pool model for the liquidity client
//! No I/O, no unwrap/panic, all functions total

pub mod intent;
pub mod math;
pub mod position;
pub mod risk;
pub mod units;

// Re-export commonly used types
pub use intent::*;
pub use position::*;
pub use risk::*;
pub use units::*;
