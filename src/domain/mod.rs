pub mod battery;
pub mod schedule;
pub mod tariff;

pub use battery::*;
pub use schedule::*;
pub use tariff::*;
