//! HTTP request handlers

pub mod analytics;
pub mod auth;
pub mod category;
pub mod guest;
pub mod health;
pub mod order;
pub mod product;
pub mod shift;
pub mod user;
pub mod write_off;

pub use health::health_check;
