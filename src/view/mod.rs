pub mod filter;
pub mod flatten;

pub use filter::*;
pub use flatten::*;
