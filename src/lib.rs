pub mod auth;
pub mod config;
pub mod dial;
pub mod http;
pub mod relay;
pub mod server;
