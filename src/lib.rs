pub mod client;
pub mod config;
pub mod core;
pub mod tls;
pub mod utils;
