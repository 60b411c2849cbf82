pub mod analytics;
pub mod asset;
pub mod holding;
pub mod price;
pub mod settings;
pub mod transaction;
