pub mod bar;
pub mod error;
pub mod hours;
pub mod key_levels;
pub mod level_store;
pub mod schema;
pub mod store;
pub mod trading_calendar;
