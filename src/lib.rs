pub mod cache;
pub mod clock;
pub mod config;
pub mod http;
pub mod schema;
pub mod sender;
pub mod store;
