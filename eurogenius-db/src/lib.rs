pub mod db;
pub mod memory;
pub mod models;
pub mod store;

pub use rusqlite;
