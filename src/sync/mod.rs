pub mod engine;
pub mod notify;

pub use engine::*;
pub use notify::*;
