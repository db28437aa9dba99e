//! Domain models for the bar point-of-sale system

mod guest;
mod order;
mod product;
mod user;

pub use guest::*;
pub use order::*;
pub use product::*;
pub use user::*;
