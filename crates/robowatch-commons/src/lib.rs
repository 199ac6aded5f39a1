pub mod cache;
pub mod config;
pub mod models;
pub mod naming;
pub mod utils;

pub use models::*;
pub use utils::*;
