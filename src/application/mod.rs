pub mod app_error;
pub mod ports;
pub mod tier_catalog;
pub mod use_cases;
