pub mod error;
pub mod event;
pub mod feed;
pub mod levels;
pub mod structure;
pub mod swing;
pub mod tracker;
