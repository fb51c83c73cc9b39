// HTTP routes
pub mod contents;
pub mod health;

pub use contents::*;
pub use health::*;
