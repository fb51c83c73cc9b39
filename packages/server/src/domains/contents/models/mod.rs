pub mod content;
pub mod remote_entity;
pub mod shop;

pub use content::*;
pub use remote_entity::*;
pub use shop::*;
