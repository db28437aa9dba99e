//! Business logic services for the bar POS server

pub mod analytics;
pub mod auth;
pub mod category;
pub mod guest;
pub mod ledger;
pub mod order;
pub mod product;
pub mod shift;
pub mod user;
pub mod write_off;

pub use analytics::AnalyticsService;
pub use auth::AuthService;
pub use category::CategoryService;
pub use guest::GuestService;
pub use ledger::StockLedger;
pub use order::OrderService;
pub use product::ProductService;
pub use shift::ShiftService;
pub use user::UserService;
pub use write_off::WriteOffService;
