pub mod align;
pub mod endpoint;
pub mod handler;
pub mod types;
